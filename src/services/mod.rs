pub mod answer_service;
pub mod record_store;
pub mod save_service;

pub use answer_service::{AnswerService, CompletionBackend, OpenAiCompletionBackend};
pub use record_store::{FileRecordStore, MemoryRecordStore, RecordStore, StoreLocation};
pub use save_service::SaveService;
