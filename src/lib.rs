pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{ErrorKind, Result, ReviewError};
pub use models::{
    CardHistory, CardState, Grade, ReviewEventReceipt, ReviewLogEntry, ReviewResult, ScheduleState,
    Scheduler,
};
pub use service::{DueCard, ReviewService};
