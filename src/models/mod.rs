pub mod batch;
pub mod record;

pub use batch::{Batch, InputDocument};
pub use record::{new_record_id, AnswerResult, Record};
