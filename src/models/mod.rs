pub mod grade;
pub mod review_log;
pub mod schedule;
pub mod scheduler;

pub use grade::Grade;
pub use review_log::{CardHistory, ReviewEventReceipt, ReviewLogEntry, ReviewResult};
pub use schedule::{CardState, DEFAULT_EASE, MAX_EASE, MIN_EASE, ScheduleState};
pub use scheduler::Scheduler;
