//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use tracing::info;

/// 记录程序启动信息
///
/// # 参数
/// - `deployment`: 目标模型部署名称
/// - `max_concurrent`: 最大并发实例数
pub fn log_startup(deployment: &str, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 请求批处理模式");
    info!("🤖 模型部署: {}", deployment);
    info!("📊 最大并发实例数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `instances`: 完成的实例数量
/// - `suspended`: 未能推进的实例数量
/// - `saved`: 保存成功的条目数量
/// - `failed`: 失败的条目数量
pub fn print_final_stats(instances: usize, suspended: usize, saved: usize, failed: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成实例: {}", instances);
    if suspended > 0 {
        info!("⏸️ 挂起实例: {} (下次启动时恢复)", suspended);
    }
    info!("💾 已保存条目: {}", saved);
    info!("❌ 失败条目: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
