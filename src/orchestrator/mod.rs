//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责实例的创建、调度和推进，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_intake` - 批次接收
//! - 解析入站文档，拒绝空文档和无效文档
//! - 每个有效文档创建一个新实例
//!
//! ### `scheduler` - 实例调度器
//! - 持久化新实例
//! - 重启后找出未完成的实例
//! - 控制并发数量（Semaphore）
//!
//! ### `controller` - 编排控制器
//! - 状态机：Validating → Running → Completed
//! - 顺序遍历批次条目（委托 workflow::ItemFlow 处理单个条目）
//! - 从历史确定性回放
//!
//! ## 层次关系
//!
//! ```text
//! batch_intake (处理入站文档)
//!     ↓
//! scheduler (处理 Vec<Instance>)
//!     ↓
//! controller (处理 Vec<Request>)
//!     ↓
//! workflow::ItemFlow (处理单个 Request)
//!     ↓
//! services (能力层：answer / save / store)
//! ```

pub mod batch_intake;
pub mod controller;
pub mod scheduler;

// 重新导出主要类型
pub use batch_intake::BatchIntake;
pub use controller::{BatchOutcome, OrchestrationController};
pub use scheduler::{InstanceScheduler, RunStats};
