//! 回放状态
//!
//! 从执行历史重建每个条目已经完成的步骤和执行游标。
//! 编排逻辑每次都从头执行，遇到已记录的步骤直接使用记录结果而不是再次调用。

use chrono::{DateTime, Utc};

use crate::error::{AppResult, HistoryError};
use crate::models::{new_record_id, Batch};
use crate::workflow::history::{AnswerOutcome, HistoryEvent, SaveOutcome};
use crate::workflow::instance::InstanceId;

/// 一次保存调用使用的记录标识和时间戳
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub record_id: String,
    pub created_utc: DateTime<Utc>,
}

impl SaveTicket {
    pub fn generate() -> Self {
        Self {
            record_id: new_record_id(),
            created_utc: Utc::now(),
        }
    }
}

/// 单个条目的已记录步骤
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemHistory {
    pub answer_scheduled: bool,
    pub answer: Option<AnswerOutcome>,
    pub save_ticket: Option<SaveTicket>,
    pub save: Option<SaveOutcome>,
}

impl ItemHistory {
    /// 条目是否已经有最终结果
    pub fn is_terminal(&self) -> bool {
        match &self.answer {
            Some(AnswerOutcome::Answered(_)) => self.save.is_some(),
            Some(_) => true,
            None => false,
        }
    }

    /// 是否有在中断时仍在进行的调用
    pub fn has_in_flight_step(&self) -> bool {
        (self.answer_scheduled && self.answer.is_none())
            || (self.save_ticket.is_some() && self.save.is_none())
    }
}

/// 回放状态
#[derive(Debug, Clone)]
pub struct ReplayState {
    batch: Batch,
    items: Vec<ItemHistory>,
    completed: bool,
}

impl ReplayState {
    /// 从事件序列重建
    ///
    /// 历史为空说明实例不存在；历史与批次或顺序处理不一致时拒绝回放
    pub fn from_events(instance_id: &InstanceId, events: &[HistoryEvent]) -> AppResult<Self> {
        let non_deterministic = |detail: String| HistoryError::NonDeterministic {
            instance_id: instance_id.to_string(),
            detail,
        };

        let (first, rest) = events
            .split_first()
            .ok_or_else(|| HistoryError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;

        let batch = match first {
            HistoryEvent::InstanceStarted { batch, .. } => batch.clone(),
            other => {
                return Err(non_deterministic(format!(
                    "第一个事件应为 instance_started，实际为 {:?}",
                    other
                ))
                .into())
            }
        };

        let mut items = vec![ItemHistory::default(); batch.len()];
        let mut completed = false;

        for event in rest {
            if completed {
                return Err(non_deterministic("instance_completed 之后仍有事件".to_string()).into());
            }

            if let Some(index) = event.item_index() {
                if index >= items.len() {
                    return Err(non_deterministic(format!(
                        "事件引用了第 {} 项，但批次只有 {} 项",
                        index + 1,
                        items.len()
                    ))
                    .into());
                }
                // 条目顺序处理：前一项必须已有最终结果
                if index > 0 && !items[index - 1].is_terminal() {
                    return Err(non_deterministic(format!(
                        "第 {} 项在第 {} 项完成前出现",
                        index + 1,
                        index
                    ))
                    .into());
                }
            }

            match event {
                HistoryEvent::InstanceStarted { .. } => {
                    return Err(non_deterministic("重复的 instance_started".to_string()).into());
                }
                HistoryEvent::AnswerScheduled { index } => {
                    let item = &mut items[*index];
                    if item.answer.is_some() {
                        return Err(non_deterministic(format!(
                            "第 {} 项的回答已完成，不应再次调度",
                            index + 1
                        ))
                        .into());
                    }
                    item.answer_scheduled = true;
                }
                HistoryEvent::AnswerCompleted { index, outcome } => {
                    let item = &mut items[*index];
                    if item.answer.is_some() {
                        return Err(
                            non_deterministic(format!("第 {} 项的回答重复记录", index + 1)).into(),
                        );
                    }
                    item.answer = Some(outcome.clone());
                }
                HistoryEvent::SaveScheduled {
                    index,
                    record_id,
                    created_utc,
                } => {
                    let item = &mut items[*index];
                    if !matches!(item.answer, Some(AnswerOutcome::Answered(_))) {
                        return Err(non_deterministic(format!(
                            "第 {} 项没有成功回答，却调度了保存",
                            index + 1
                        ))
                        .into());
                    }
                    if item.save_ticket.is_some() {
                        return Err(
                            non_deterministic(format!("第 {} 项的保存重复调度", index + 1)).into(),
                        );
                    }
                    item.save_ticket = Some(SaveTicket {
                        record_id: record_id.clone(),
                        created_utc: *created_utc,
                    });
                }
                HistoryEvent::SaveCompleted { index, outcome } => {
                    let item = &mut items[*index];
                    if item.save_ticket.is_none() || item.save.is_some() {
                        return Err(non_deterministic(format!(
                            "第 {} 项的保存结果与调度不匹配",
                            index + 1
                        ))
                        .into());
                    }
                    item.save = Some(outcome.clone());
                }
                HistoryEvent::InstanceCompleted { .. } => {
                    completed = true;
                }
            }
        }

        Ok(Self {
            batch,
            items,
            completed,
        })
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// 第 `index` 项的已记录步骤；超出范围时返回空记录
    pub fn item(&self, index: usize) -> ItemHistory {
        self.items.get(index).cloned().unwrap_or_default()
    }

    /// 恢复游标：第一个还没有最终结果的条目
    pub fn resume_index(&self) -> usize {
        self.items
            .iter()
            .position(|item| !item.is_terminal())
            .unwrap_or(self.items.len())
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// 历史中已经完成的外部调用数量
    pub fn recorded_steps(&self) -> usize {
        self.items
            .iter()
            .map(|item| usize::from(item.answer.is_some()) + usize::from(item.save.is_some()))
            .sum()
    }
}
