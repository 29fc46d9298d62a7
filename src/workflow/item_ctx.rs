//! 条目处理上下文
//!
//! 封装"我正在处理哪个实例的第几项"这一信息

use std::fmt::Display;

use crate::utils::truncate_text;
use crate::workflow::instance::InstanceId;

/// 条目处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 实例标识
    pub instance_id: InstanceId,

    /// 条目在批次中的索引（从0开始）
    pub index: usize,

    /// 批次条目总数（仅用于日志显示）
    pub total: usize,

    /// 请求预览（仅用于日志显示）
    pub request_preview: String,
}

impl ItemCtx {
    /// 创建新的条目上下文
    pub fn new(instance_id: InstanceId, index: usize, total: usize, request: &str) -> Self {
        Self {
            instance_id,
            index,
            total,
            request_preview: truncate_text(request, 60),
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[实例 {}] [条目 {}/{}]",
            self.instance_id,
            self.index + 1,
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        let ctx = ItemCtx::new(InstanceId::from("abc"), 0, 2, "Summarize X");
        assert_eq!(ctx.to_string(), "[实例 abc] [条目 1/2]");
    }
}
