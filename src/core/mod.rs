pub mod evaluator;
pub mod filter;
pub mod models;
pub mod notifications;

pub use evaluator::{FailureEvaluator, JobRunQueries};
pub use filter::Filter;
pub use models::{
    JobResult, JobRun, JobSessionList, MessageType, RepositoryPeriod, RepositoryReport, Timestamp,
};
pub use notifications::{Alert, NotificationChannel, create_notifier};
