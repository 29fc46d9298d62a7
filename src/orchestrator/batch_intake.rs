//! 批次接收 - 编排层入口
//!
//! 把入站文档解析为批次并创建实例。任何输入问题都"失败即关闭"：
//! 记录错误、不创建实例。相同内容的批次不去重。

use tracing::{error, info};

use crate::error::{AppResult, IntakeError};
use crate::models::{Batch, InputDocument};
use crate::orchestrator::scheduler::InstanceScheduler;
use crate::utils::truncate_text;
use crate::workflow::InstanceId;

/// 批次接收
#[derive(Clone)]
pub struct BatchIntake {
    scheduler: InstanceScheduler,
}

impl BatchIntake {
    pub fn new(scheduler: InstanceScheduler) -> Self {
        Self { scheduler }
    }

    /// 解析入站文档
    pub fn parse(bytes: &[u8]) -> Result<Batch, IntakeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(IntakeError::EmptyInput);
        }

        let document: InputDocument = serde_json::from_slice(bytes)
            .map_err(|source| IntakeError::Malformed { source })?;

        Batch::try_from(document)
    }

    /// 接收一个入站文档并创建实例
    ///
    /// # 参数
    /// - `name`: 文档名称（仅用于日志）
    /// - `bytes`: 文档内容
    ///
    /// # 返回
    /// 成功时返回新实例的标识；失败时已经记录错误，并且没有创建任何实例
    pub async fn ingest(&self, name: &str, bytes: &[u8]) -> AppResult<InstanceId> {
        let batch = match Self::parse(bytes) {
            Ok(batch) => batch,
            Err(e) => {
                error!("[接收] 文档 [{}] 为空或无效: {}", name, e);
                return Err(e.into());
            }
        };

        let count = batch.len();
        let first = truncate_text(&batch.requests()[0], 40);

        match self.scheduler.schedule_new_instance(batch).await {
            Ok(instance_id) => {
                info!(
                    "[接收] 文档 [{}] 已创建实例 [{}]，共 {} 个请求（首项: {}）",
                    name, instance_id, count, first
                );
                Ok(instance_id)
            }
            Err(e) => {
                error!("[接收] 文档 [{}] 创建实例失败: {}", name, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let batch = BatchIntake::parse(br#"{"requests": ["Summarize X", "Translate Y"]}"#).unwrap();
        assert_eq!(batch.requests(), &["Summarize X", "Translate Y"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(BatchIntake::parse(b""), Err(IntakeError::EmptyInput)));
        assert!(matches!(
            BatchIntake::parse(b" \n\t"),
            Err(IntakeError::EmptyInput)
        ));
    }

    #[test]
    fn test_parse_malformed_input() {
        assert!(matches!(
            BatchIntake::parse(b"{not json"),
            Err(IntakeError::Malformed { .. })
        ));
        assert!(matches!(
            BatchIntake::parse(br#"{"requests": "one"}"#),
            Err(IntakeError::Malformed { .. })
        ));
        assert!(matches!(
            BatchIntake::parse(&[0xff, 0xfe, 0x00]),
            Err(IntakeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_missing_or_empty_requests() {
        assert!(matches!(
            BatchIntake::parse(br#"{"other": 1}"#),
            Err(IntakeError::MissingRequests)
        ));
        assert!(matches!(
            BatchIntake::parse(br#"{"requests": null}"#),
            Err(IntakeError::MissingRequests)
        ));
        assert!(matches!(
            BatchIntake::parse(br#"{"requests": []}"#),
            Err(IntakeError::NoRequests)
        ));
    }

    #[test]
    fn test_parse_blank_request() {
        assert!(matches!(
            BatchIntake::parse(br#"{"requests": ["ok", ""]}"#),
            Err(IntakeError::BlankRequest { index: 1 })
        ));
    }
}
