//! 日志初始化

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化全局日志
///
/// `RUST_LOG` 优先；未设置时默认 `prompt_processor=info`，`verbose` 为 true 时使用 debug 级别。
/// 重复调用是安全的（第二次调用会被忽略）。
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "prompt_processor=debug,info"
    } else {
        "prompt_processor=info,warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
