use crate::error::IntakeError;
use serde::{Deserialize, Serialize};

/// 入站文档的线上格式：`{ "requests": [string, ...] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<String>>,
}

/// 一个批次：按原始顺序排列的请求列表
///
/// 不变量：非空，且每个请求都不是空白字符串。创建后不可修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    requests: Vec<String>,
}

impl Batch {
    /// 创建批次并检查不变量
    pub fn new(requests: Vec<String>) -> Result<Self, IntakeError> {
        if requests.is_empty() {
            return Err(IntakeError::NoRequests);
        }
        if let Some(index) = requests.iter().position(|r| r.trim().is_empty()) {
            return Err(IntakeError::BlankRequest { index });
        }
        Ok(Self { requests })
    }

    /// 重新检查不变量
    ///
    /// 从执行历史反序列化得到的批次不经过 `new`，因此需要再次校验
    pub fn is_valid(&self) -> bool {
        !self.is_empty() && self.requests.iter().all(|r| !r.trim().is_empty())
    }

    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl TryFrom<InputDocument> for Batch {
    type Error = IntakeError;

    fn try_from(document: InputDocument) -> Result<Self, Self::Error> {
        let requests = document.requests.ok_or(IntakeError::MissingRequests)?;
        Batch::new(requests)
    }
}
