//! # Prompt Processor
//!
//! 接收一批自然语言请求，逐个交给外部补全服务回答，并把每个请求/回答对持久化为记录。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个请求
//! - `AnswerService` - 补全能力（后端：`CompletionBackend`）
//! - `SaveService` - 校验并写入记录能力（后端：`RecordStore`）
//!
//! ### ② 流程层（Workflow）
//! - `workflow/` - 定义"一个请求"的完整处理流程和执行历史
//! - `ItemFlow` - 流程编排（answer → save），每次外部调用前后写检查点
//! - `HistoryStore` / `ReplayState` - 只追加的事件日志与回放
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/controller` - 实例状态机，顺序遍历条目，失败隔离
//! - `orchestrator/scheduler` - 实例持久化、恢复与并发
//! - `orchestrator/batch_intake` - 入站文档解析
//!
//! ### ④ 应用层（App）
//! - `app` - 启动、扫描输入目录、运行实例、输出统计
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AnswerResult, Batch, InputDocument, Record};
pub use orchestrator::{BatchIntake, BatchOutcome, InstanceScheduler, OrchestrationController, RunStats};
pub use workflow::{InstanceId, ItemOutcome, WorkflowState};
