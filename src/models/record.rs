use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一个请求及其回答
///
/// 由回答步骤产生，按值传给保存步骤，保存后不再保留
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub request: String,
    pub response: String,
}

impl AnswerResult {
    pub fn new(request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: response.into(),
        }
    }
}

/// 持久化记录
///
/// 标识在构造时分配，不从内容推导
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdUtc")]
    pub created_utc: DateTime<Utc>,
    pub request: String,
    pub response: String,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        created_utc: DateTime<Utc>,
        answer: AnswerResult,
    ) -> Self {
        Self {
            id: id.into(),
            created_utc,
            request: answer.request,
            response: answer.response,
        }
    }

    /// 标识、请求和回答都非空时记录才有效
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.request.is_empty() && !self.response.is_empty()
    }
}

/// 生成新的记录标识
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}
