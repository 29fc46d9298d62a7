pub mod history;
pub mod instance;
pub mod item_ctx;
pub mod item_flow;
pub mod replay;
pub mod replay_log;

pub use history::{
    AnswerOutcome, FileHistoryStore, HistoryEvent, HistoryStore, MemoryHistoryStore, SaveOutcome,
};
pub use instance::{InstanceId, WorkflowInstance, WorkflowState};
pub use item_ctx::ItemCtx;
pub use item_flow::{ItemFlow, ItemOutcome, ItemRun, Stage};
pub use replay::{ItemHistory, ReplayState, SaveTicket};
pub use replay_log::ReplaySafeLogger;
