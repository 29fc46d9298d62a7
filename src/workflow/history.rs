//! 执行历史 - 只追加的事件日志
//!
//! 每次外部调用前后各记录一个事件（检查点）：
//!
//! ```text
//! InstanceStarted
//!   AnswerScheduled(i) → AnswerCompleted(i)
//!   SaveScheduled(i)   → SaveCompleted(i)      (仅当回答成功)
//!   ...
//! InstanceCompleted
//! ```
//!
//! 只有 `*Scheduled` 没有对应 `*Completed` 的步骤，说明中断时调用仍在进行，恢复时会再次调用。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult, HistoryError};
use crate::models::{Batch, Record};
use crate::workflow::instance::InstanceId;

/// 回答步骤的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered(String),
    NoContent,
    Failed(String),
}

/// 保存步骤的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved(Record),
    Rejected,
    Failed(String),
}

/// 历史事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    InstanceStarted {
        batch: Batch,
        scheduled_utc: DateTime<Utc>,
    },
    AnswerScheduled {
        index: usize,
    },
    AnswerCompleted {
        index: usize,
        outcome: AnswerOutcome,
    },
    /// 记录标识和时间戳在调用前生成并记录，重新调用时沿用
    SaveScheduled {
        index: usize,
        record_id: String,
        created_utc: DateTime<Utc>,
    },
    SaveCompleted {
        index: usize,
        outcome: SaveOutcome,
    },
    InstanceCompleted {
        completed_utc: DateTime<Utc>,
    },
}

impl HistoryEvent {
    /// 事件所属条目的索引
    pub fn item_index(&self) -> Option<usize> {
        match self {
            HistoryEvent::AnswerScheduled { index }
            | HistoryEvent::AnswerCompleted { index, .. }
            | HistoryEvent::SaveScheduled { index, .. }
            | HistoryEvent::SaveCompleted { index, .. } => Some(*index),
            HistoryEvent::InstanceStarted { .. } | HistoryEvent::InstanceCompleted { .. } => None,
        }
    }
}

/// 历史存储
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加一个事件，返回前必须已持久化
    async fn append(&self, instance_id: &InstanceId, event: &HistoryEvent) -> AppResult<()>;

    /// 按追加顺序读取实例的全部事件；实例不存在时返回空列表
    async fn load(&self, instance_id: &InstanceId) -> AppResult<Vec<HistoryEvent>>;

    /// 列出所有有历史的实例
    async fn list_instances(&self) -> AppResult<Vec<InstanceId>>;
}

/// 文件历史存储
///
/// 每个实例一个 JSON Lines 文件：`<dir>/<instance_id>.jsonl`
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.history_dir)
    }

    fn path(&self, instance_id: &InstanceId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", instance_id))
    }

    /// 截掉写到一半的最后一行
    async fn truncate_tail(&self, instance_id: &InstanceId, valid_len: u64) -> AppResult<()> {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.path(instance_id))
            .await
            .map_err(|e| AppError::history_load_failed(instance_id.as_str(), e))?;
        file.set_len(valid_len)
            .await
            .map_err(|e| AppError::history_load_failed(instance_id.as_str(), e))?;
        file.sync_all()
            .await
            .map_err(|e| AppError::history_load_failed(instance_id.as_str(), e))?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, instance_id: &InstanceId, event: &HistoryEvent) -> AppResult<()> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| AppError::history_append_failed(instance_id.as_str(), e))?;
        line.push('\n');

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::history_append_failed(instance_id.as_str(), e))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(instance_id))
            .await
            .map_err(|e| AppError::history_append_failed(instance_id.as_str(), e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::history_append_failed(instance_id.as_str(), e))?;
        file.sync_data()
            .await
            .map_err(|e| AppError::history_append_failed(instance_id.as_str(), e))?;

        Ok(())
    }

    async fn load(&self, instance_id: &InstanceId) -> AppResult<Vec<HistoryEvent>> {
        let content = match fs::read_to_string(self.path(instance_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::history_load_failed(instance_id.as_str(), e)),
        };

        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut events = Vec::with_capacity(lines.len());
        let mut valid_len = 0u64;

        for (line_no, raw) in lines.iter().enumerate() {
            // 只有最后一行可能没有换行符：追加在返回前被中断
            if !raw.ends_with('\n') {
                warn!(
                    "[实例 {}] 历史最后一行不完整（写入被中断），已丢弃",
                    instance_id
                );
                self.truncate_tail(instance_id, valid_len).await?;
                break;
            }

            valid_len += raw.len() as u64;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event = serde_json::from_str::<HistoryEvent>(trimmed).map_err(|e| {
                HistoryError::Corrupt {
                    instance_id: instance_id.to_string(),
                    line: line_no + 1,
                    source: e,
                }
            })?;
            events.push(event);
        }

        Ok(events)
    }

    async fn list_instances(&self) -> AppResult<Vec<InstanceId>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(AppError::history_load_failed("*", e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::history_load_failed("*", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(InstanceId::from(stem));
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// 内存历史存储
#[derive(Default)]
pub struct MemoryHistoryStore {
    events: Mutex<HashMap<InstanceId, Vec<HistoryEvent>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一组历史（用于恢复场景）
    pub async fn seed(&self, instance_id: &InstanceId, events: Vec<HistoryEvent>) {
        self.events.lock().await.insert(instance_id.clone(), events);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, instance_id: &InstanceId, event: &HistoryEvent) -> AppResult<()> {
        self.events
            .lock()
            .await
            .entry(instance_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn load(&self, instance_id: &InstanceId) -> AppResult<Vec<HistoryEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .get(instance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_instances(&self) -> AppResult<Vec<InstanceId>> {
        let mut ids: Vec<InstanceId> = self.events.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
