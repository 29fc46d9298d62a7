//! 回放安全日志
//!
//! 回放时重新执行的日志语句降级为 debug 并加上回放标记，
//! 运维人员在 info 及以上级别只会看到每个实时事件一次。

use std::fmt::Display;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ReplaySafeLogger {
    replaying: bool,
}

impl ReplaySafeLogger {
    /// `replaying` 为 true 表示本次写日志的事件已经在历史中
    pub fn new(replaying: bool) -> Self {
        Self { replaying }
    }

    pub fn info(&self, prefix: impl Display, message: impl Display) {
        if self.replaying {
            debug!("{} [回放] {}", prefix, message);
        } else {
            info!("{} {}", prefix, message);
        }
    }

    pub fn warn(&self, prefix: impl Display, message: impl Display) {
        if self.replaying {
            debug!("{} [回放] {}", prefix, message);
        } else {
            warn!("{} {}", prefix, message);
        }
    }

    pub fn error(&self, prefix: impl Display, message: impl Display) {
        if self.replaying {
            debug!("{} [回放] {}", prefix, message);
        } else {
            error!("{} {}", prefix, message);
        }
    }
}
