//! 记录存储 - 业务能力层
//!
//! 按标识"不存在则创建"地写入记录，不做查询和索引

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, StoreError};
use crate::models::Record;

/// 记录写入位置（数据库 + 容器）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreLocation {
    pub database: String,
    pub container: String,
}

impl StoreLocation {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cosmos_db_database, &config.cosmos_db_container)
    }
}

/// 持久化记录存储
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 以记录标识为键写入；记录已存在时不覆盖
    ///
    /// # 返回
    /// 新建返回 `true`，已存在返回 `false`
    async fn create_if_absent(&self, location: &StoreLocation, record: &Record) -> AppResult<bool>;
}

/// 文件记录存储
///
/// 每条记录一个文件：`<root>/<database>/<container>/<id>.json`
///
/// 记录先写入同目录的临时文件并 fsync，再原子地发布到目标路径，
/// 目标路径上只会出现完整的记录
pub struct FileRecordStore {
    root: PathBuf,
    create_if_not_exists: bool,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>, create_if_not_exists: bool) -> Self {
        Self {
            root: root.into(),
            create_if_not_exists,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.store_root, config.create_if_not_exists)
    }

    fn container_dir(&self, location: &StoreLocation) -> PathBuf {
        self.root.join(&location.database).join(&location.container)
    }

    async fn ensure_container(&self, location: &StoreLocation) -> AppResult<PathBuf> {
        let dir = self.container_dir(location);
        let exists = fs::try_exists(&dir)
            .await
            .map_err(|e| StoreError::ReadFailed {
                path: dir.display().to_string(),
                source: Box::new(e),
            })?;
        if exists {
            return Ok(dir);
        }
        if !self.create_if_not_exists {
            return Err(StoreError::ContainerNotFound {
                database: location.database.clone(),
                container: location.container.clone(),
            }
            .into());
        }
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::store_write_failed(dir.display().to_string(), e))?;
        Ok(dir)
    }

    /// 读取一条记录
    pub async fn read(&self, location: &StoreLocation, id: &str) -> AppResult<Option<Record>> {
        let path = self.container_dir(location).join(format!("{}.json", id));
        read_record(&path).await
    }

    /// 列出容器中的全部记录
    pub async fn list(&self, location: &StoreLocation) -> AppResult<Vec<Record>> {
        let dir = self.container_dir(location);
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: dir.display().to_string(),
                    source: Box::new(e),
                }
                .into())
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(record) = read_record(&path).await? {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }
}

async fn read_record(path: &Path) -> AppResult<Option<Record>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::ReadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            }
            .into())
        }
    };
    let record = serde_json::from_str(&content).map_err(|e| StoreError::ReadFailed {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;
    Ok(Some(record))
}

/// 写入临时文件并发布到 `target`
///
/// `replace` 为 false 时不覆盖已有文件，目标已存在返回 `Ok(false)`
fn publish_atomic(dir: &Path, target: &Path, body: &[u8], replace: bool) -> std::io::Result<bool> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(body)?;
    temp.as_file().sync_all()?;

    let persisted = if replace {
        temp.persist(target)
    } else {
        temp.persist_noclobber(target)
    };

    // 发布失败时临时文件随 PersistError 一起删除
    match persisted {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn create_if_absent(&self, location: &StoreLocation, record: &Record) -> AppResult<bool> {
        let dir = self.ensure_container(location).await?;
        let path = dir.join(format!("{}.json", record.id));

        let replace = match read_record(&path).await {
            Ok(Some(_)) => {
                debug!("记录已存在，跳过写入: {}", record.id);
                return Ok(false);
            }
            Ok(None) => false,
            Err(e) => {
                warn!("记录文件不完整，重新写入 [{}]: {}", record.id, e);
                true
            }
        };

        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| AppError::store_write_failed(&record.id, e))?;

        let created = tokio::task::spawn_blocking(move || publish_atomic(&dir, &path, &body, replace))
            .await
            .map_err(|e| AppError::store_write_failed(&record.id, e))?
            .map_err(|e| AppError::store_write_failed(&record.id, e))?;

        if !created {
            debug!("记录已由其他写入者创建: {}", record.id);
        }
        Ok(created)
    }
}

/// 内存记录存储
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<StoreLocation, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 容器中的全部记录（按写入顺序）
    pub async fn records(&self, location: &StoreLocation) -> Vec<Record> {
        self.records
            .lock()
            .await
            .get(location)
            .cloned()
            .unwrap_or_default()
    }

    /// 所有容器中的记录总数
    pub async fn len(&self) -> usize {
        self.records.lock().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_if_absent(&self, location: &StoreLocation, record: &Record) -> AppResult<bool> {
        let mut records = self.records.lock().await;
        let container = records.entry(location.clone()).or_default();
        if container.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        container.push(record.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerResult;
    use chrono::Utc;

    fn record(id: &str) -> Record {
        Record::new(id, Utc::now(), AnswerResult::new("Summarize X", "X is ..."))
    }

    #[tokio::test]
    async fn test_file_store_create_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), true);
        let location = StoreLocation::new("db", "container");

        assert!(store.create_if_absent(&location, &record("a")).await.unwrap());
        assert!(!store.create_if_absent(&location, &record("a")).await.unwrap());
        assert!(store.create_if_absent(&location, &record("b")).await.unwrap());

        let records = store.list(&location).await.unwrap();
        assert_eq!(records.len(), 2);

        let read = store.read(&location, "a").await.unwrap().unwrap();
        assert_eq!(read.response, "X is ...");
        assert!(dir.path().join("db/container/a.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_missing_container_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), false);
        let location = StoreLocation::new("db", "container");

        let err = store
            .create_if_absent(&location, &record("a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Store(StoreError::ContainerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_reports_unreadable_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();
        let store = FileRecordStore::new(&file, false);
        let location = StoreLocation::new("db", "container");

        let err = store
            .create_if_absent(&location, &record("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::ReadFailed { .. })));
    }

    #[tokio::test]
    async fn test_file_store_replaces_partial_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), true);
        let location = StoreLocation::new("db", "container");

        let container = dir.path().join("db/container");
        std::fs::create_dir_all(&container).unwrap();
        std::fs::write(container.join("rec-1.json"), r#"{"id":"rec-1","crea"#).unwrap();

        assert!(store.create_if_absent(&location, &record("rec-1")).await.unwrap());

        let read = store.read(&location, "rec-1").await.unwrap().unwrap();
        assert_eq!(read.id, "rec-1");
        assert_eq!(read.response, "X is ...");
        assert_eq!(store.list(&location).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), true);
        let location = StoreLocation::new("db", "container");

        store.create_if_absent(&location, &record("a")).await.unwrap();
        store.create_if_absent(&location, &record("a")).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("db/container"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }

    #[tokio::test]
    async fn test_memory_store_keyed_by_id() {
        let store = MemoryRecordStore::new();
        let location = StoreLocation::new("db", "container");

        assert!(store.create_if_absent(&location, &record("a")).await.unwrap());
        assert!(!store.create_if_absent(&location, &record("a")).await.unwrap());
        assert_eq!(store.len().await, 1);
    }
}
