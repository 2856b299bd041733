// Library surface for the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod bank;
pub mod config;
pub mod error;
pub mod history;
pub mod question;
pub mod queue;
pub mod quiz;
pub mod runtime;
pub mod scheduler;
pub mod seen;
pub mod session;
pub mod store;
pub mod util;

pub use bank::{BankSource, QuestionBank};
pub use error::{AppError, BankError, StoreError};
pub use history::HistoryRecord;
pub use question::{resolve_id, Question};
pub use queue::DeliveryQueue;
pub use quiz::Quiz;
pub use scheduler::{Exam, Scheduler};
pub use seen::{Coverage, SeenSet};
pub use session::{SessionConfig, SessionState};
pub use store::{KvStore, MemoryStore, ProgressStore, SqliteStore};
