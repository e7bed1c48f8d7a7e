//! Review orchestration around the scheduler.
//!
//! `submit_review` is a read-modify-write of one card's schedule inside an
//! IMMEDIATE SQLite transaction: the write lock is taken before the read, so
//! two submissions for the same card (from this process or another one
//! sharing the file) are applied one after the other. The transaction rolls
//! back on drop, so an interrupted call leaves the previous schedule intact.
//!
//! `record_review_event` is a separate single-row append to the review log
//! and never touches the schedule.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::database::db;
use crate::error::{Result, ReviewError};
use crate::models::{
    CardHistory, Grade, ReviewEventReceipt, ReviewLogEntry, ReviewResult, ScheduleState, Scheduler,
};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A card that is eligible for study, with its current schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueCard {
    pub card_id: i64,
    #[serde(flatten)]
    pub schedule: ScheduleState,
}

pub struct ReviewService {
    conn: Mutex<Connection>,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(conn: Connection, scheduler: Scheduler, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn: Mutex::new(conn),
            scheduler,
            clock,
        }
    }

    /// Opens the configured database with the wall clock.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = db::open_database(&config.db_path, config.busy_timeout_ms)?;
        Ok(Self::new(conn, config.scheduler(), clock))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// A panic while the lock was held already rolled back any open
    /// transaction, so a poisoned connection is still usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("connection lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Runs `f` against the underlying connection, e.g. for card plumbing.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Applies a graded review given as its wire string (`again|hard|good|easy`).
    pub fn submit_review(&self, card_id: i64, grade: &str) -> Result<ScheduleState> {
        let grade: Grade = grade.parse()?;
        self.submit_grade(card_id, grade)
    }

    /// Applies a graded review and returns the card's new schedule.
    pub fn submit_grade(&self, card_id: i64, grade: Grade) -> Result<ScheduleState> {
        self.apply_grade(card_id, grade).inspect_err(|err| {
            if err.is_retryable() {
                warn!(card_id, %grade, error = %err, "review not applied");
            }
        })
    }

    fn apply_grade(&self, card_id: i64, grade: Grade) -> Result<ScheduleState> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = db::load_schedule(card_id, &tx)?.ok_or(ReviewError::NotFound(card_id))?;
        let now = self.clock.now();
        let next = self.scheduler.next(&current, grade, now);
        db::save_schedule(card_id, &next, now, &tx)?;
        tx.commit()?;

        debug!(
            card_id,
            %grade,
            from = %current.state,
            to = %next.state,
            step = next.step,
            interval = next.interval,
            ease = next.ease,
            "schedule updated"
        );
        Ok(next)
    }

    /// Appends a pass/fail/timeout/reveal entry to the card's review log.
    pub fn record_review_event(
        &self,
        card_id: i64,
        result: &str,
        duration_ms: Option<i64>,
    ) -> Result<ReviewEventReceipt> {
        let result: ReviewResult = result.parse()?;
        let duration_ms = duration_ms
            .map(|ms| {
                u64::try_from(ms)
                    .map_err(|_| ReviewError::invalid(format!("negative duration {ms}ms")))
            })
            .transpose()?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !db::card_exists(card_id, &tx)? {
            return Err(ReviewError::NotFound(card_id));
        }
        let entry_id = db::insert_review_log(card_id, result, duration_ms, self.clock.now(), &tx)?;
        tx.commit()?;

        info!(card_id, entry_id, %result, ?duration_ms, "review event recorded");
        Ok(ReviewEventReceipt { entry_id })
    }

    pub fn schedule(&self, card_id: i64) -> Result<ScheduleState> {
        let conn = self.lock();
        db::load_schedule(card_id, &conn)?.ok_or(ReviewError::NotFound(card_id))
    }

    /// Candidate schedules for each grade, without persisting anything.
    pub fn preview(&self, card_id: i64) -> Result<[(Grade, ScheduleState); 4]> {
        let current = self.schedule(card_id)?;
        Ok(self.scheduler.preview(&current, self.clock.now()))
    }

    /// Review log of a card, oldest first.
    pub fn review_log(&self, card_id: i64) -> Result<Vec<ReviewLogEntry>> {
        let conn = self.lock();
        if !db::card_exists(card_id, &conn)? {
            return Err(ReviewError::NotFound(card_id));
        }
        db::review_log_for_card(card_id, &conn)
    }

    pub fn card_history(&self, card_id: i64) -> Result<CardHistory> {
        let conn = self.lock();
        let schedule = db::load_schedule(card_id, &conn)?.ok_or(ReviewError::NotFound(card_id))?;
        let reviews = db::review_log_for_card(card_id, &conn)?;
        Ok(CardHistory {
            card_id,
            schedule,
            reviews,
        })
    }

    /// Cards due now, optionally within one deck. Defaults to 50 cards.
    pub fn due_cards(&self, deck_id: Option<i64>, limit: Option<u32>) -> Result<Vec<DueCard>> {
        let conn = self.lock();
        let cards = db::due_cards(deck_id, limit, self.clock.now(), &conn)?;
        Ok(cards
            .into_iter()
            .map(|(card_id, schedule)| DueCard { card_id, schedule })
            .collect())
    }
}
