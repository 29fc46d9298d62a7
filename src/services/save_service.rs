//! 保存服务 - 业务能力层
//!
//! 只负责"校验并写入一条记录"能力，不关心流程

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::AppResult;
use crate::models::{AnswerResult, Record};
use crate::services::record_store::{RecordStore, StoreLocation};

/// 保存服务
///
/// 职责：
/// - 由请求/回答对和调用方生成的标识、时间戳构造记录
/// - 拒绝不完整的记录（不写入，不报错）
/// - 以标识为键"不存在则创建"；不按内容去重
#[derive(Clone)]
pub struct SaveService {
    store: Arc<dyn RecordStore>,
    location: StoreLocation,
}

impl SaveService {
    pub fn new(store: Arc<dyn RecordStore>, location: StoreLocation) -> Self {
        Self { store, location }
    }

    /// 保存一条记录
    ///
    /// # 返回
    /// - `Ok(Some(record))`: 已写入（或此标识的记录已存在）
    /// - `Ok(None)`: 记录不完整，已拒绝
    /// - `Err(_)`: 存储写入失败
    pub async fn save(
        &self,
        answer: AnswerResult,
        record_id: &str,
        created_utc: DateTime<Utc>,
    ) -> AppResult<Option<Record>> {
        let record = Record::new(record_id, created_utc, answer);

        if !record.is_valid() {
            error!("[保存] 收到无效记录 (id: '{}')，已拒绝", record.id);
            return Ok(None);
        }

        let created = self.store.create_if_absent(&self.location, &record).await?;
        if created {
            info!("[保存] 已保存记录 [{}]", record.id);
        } else {
            info!("[保存] 记录 [{}] 已存在，未重复写入", record.id);
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::new_record_id;
    use crate::services::record_store::MemoryRecordStore;

    fn service() -> (SaveService, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        let service = SaveService::new(store.clone(), StoreLocation::new("db", "container"));
        (service, store)
    }

    #[tokio::test]
    async fn test_incomplete_record_rejected() {
        let (service, store) = service();

        let saved = service
            .save(AnswerResult::new("Summarize X", ""), &new_record_id(), Utc::now())
            .await
            .unwrap();
        assert!(saved.is_none());

        let saved = service
            .save(AnswerResult::new("Summarize X", "X is ..."), "", Utc::now())
            .await
            .unwrap();
        assert!(saved.is_none());

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_same_content_two_ids_two_records() {
        let (service, store) = service();
        let answer = AnswerResult::new("Summarize X", "X is ...");

        let first = service
            .save(answer.clone(), &new_record_id(), Utc::now())
            .await
            .unwrap()
            .unwrap();
        let second = service
            .save(answer, &new_record_id(), Utc::now())
            .await
            .unwrap()
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_same_id_written_once() {
        let (service, store) = service();
        let id = new_record_id();
        let created = Utc::now();

        for _ in 0..2 {
            let saved = service
                .save(AnswerResult::new("Summarize X", "X is ..."), &id, created)
                .await
                .unwrap();
            assert!(saved.is_some());
        }

        assert_eq!(store.len().await, 1);
    }
}
