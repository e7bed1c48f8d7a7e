//! Spaced-repetition transition function.
//!
//! Cards move through three phases:
//! - `new`: never graded. The first grade enters the learning ladder.
//! - `learning`: short re-study steps measured in minutes (default `[1, 10]`).
//!   `again` restarts the ladder, `hard` repeats the current rung, `good`
//!   climbs one rung and graduates past the last one, `easy` graduates at once.
//! - `review`: intervals measured in calendar days and grown by the card's
//!   ease. Failing a review card resets its interval and counts a lapse; it
//!   stays in `review`.
//!
//! Ease is a fixed-point percentage. All interval arithmetic is done on
//! integers and rounded once, half to even, so results are reproducible.

use super::{CardState, Grade, MAX_EASE, MIN_EASE, ScheduleState};
use crate::clock::days_after;
use crate::error::{Result, ReviewError};
use chrono::{DateTime, Duration, Utc};

/// Default learning ladder, in minutes.
pub const DEFAULT_LEARNING_STEPS: [u32; 2] = [1, 10];
/// Upper bound on review intervals, in days.
pub const DEFAULT_MAX_INTERVAL: u32 = 36_500;

const GRADUATING_INTERVAL: u32 = 1;
const EASY_INTERVAL: u32 = 3;
const LAPSE_EASE_PENALTY: u32 = 200;
const HARD_EASE_PENALTY: u32 = 150;
const EASY_EASE_BONUS: u32 = 150;
/// Percent growth of a `hard` review interval.
const HARD_INTERVAL_FACTOR: u64 = 120;
/// Percent bonus on top of ease for an `easy` review.
const EASY_BONUS_FACTOR: u64 = 130;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheduler {
    learning_steps: Vec<u32>,
    max_interval: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            learning_steps: DEFAULT_LEARNING_STEPS.to_vec(),
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl Scheduler {
    /// Builds a scheduler with a custom ladder. Every rung must be at least one minute.
    pub fn with_learning_steps(steps: Vec<u32>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ReviewError::invalid("learning ladder must have at least one step"));
        }
        if steps.contains(&0) {
            return Err(ReviewError::invalid("learning steps must be at least one minute"));
        }
        Ok(Self {
            learning_steps: steps,
            ..Self::default()
        })
    }

    /// Caps review intervals at `days`. The cap never goes below the
    /// three-day interval of an `easy` graduation.
    pub fn with_max_interval(mut self, days: u32) -> Self {
        self.max_interval = days.max(EASY_INTERVAL);
        self
    }

    pub fn learning_steps(&self) -> &[u32] {
        &self.learning_steps
    }

    /// Computes the schedule that follows `grade` at `now`.
    pub fn next(&self, state: &ScheduleState, grade: Grade, now: DateTime<Utc>) -> ScheduleState {
        let current = Self::normalized(state);
        match current.state {
            CardState::New | CardState::Learning => self.next_learning(current, grade, now),
            CardState::Review => self.next_review(current, grade, now),
        }
    }

    /// Candidate schedules for all four grades, in `Grade::ALL` order.
    pub fn preview(&self, state: &ScheduleState, now: DateTime<Utc>) -> [(Grade, ScheduleState); 4] {
        Grade::ALL.map(|grade| (grade, self.next(state, grade, now)))
    }

    /// Repairs out-of-range values read from storage.
    fn normalized(state: &ScheduleState) -> ScheduleState {
        let mut s = state.clone();
        s.ease = s.ease.clamp(MIN_EASE, MAX_EASE);
        if s.state == CardState::Review {
            s.interval = s.interval.max(1);
        }
        if s.state == CardState::New {
            s.step = 0;
        }
        s
    }

    fn next_learning(&self, mut s: ScheduleState, grade: Grade, now: DateTime<Utc>) -> ScheduleState {
        s.state = CardState::Learning;
        match grade {
            Grade::Again => {
                s.step = 0;
                s.due = Some(now + self.step_delay(0));
            }
            Grade::Hard => {
                s.due = Some(now + self.step_delay(s.step));
            }
            Grade::Good => {
                s.step = s.step.saturating_add(1);
                if s.step as usize >= self.learning_steps.len() {
                    return self.graduate(s, GRADUATING_INTERVAL, now);
                }
                s.due = Some(now + self.step_delay(s.step));
            }
            Grade::Easy => return self.graduate(s, EASY_INTERVAL, now),
        }
        s
    }

    fn graduate(&self, mut s: ScheduleState, interval: u32, now: DateTime<Utc>) -> ScheduleState {
        s.state = CardState::Review;
        s.step = 0;
        s.interval = interval.min(self.max_interval);
        s.due = Some(days_after(now, s.interval));
        s
    }

    fn next_review(&self, mut s: ScheduleState, grade: Grade, now: DateTime<Utc>) -> ScheduleState {
        let ivl = u64::from(s.interval);
        let interval = match grade {
            Grade::Again => {
                s.lapses = s.lapses.saturating_add(1);
                s.ease = s.ease.saturating_sub(LAPSE_EASE_PENALTY).max(MIN_EASE);
                1
            }
            Grade::Hard => {
                s.ease = s.ease.saturating_sub(HARD_EASE_PENALTY).max(MIN_EASE);
                round_half_even(ivl * HARD_INTERVAL_FACTOR, 100)
            }
            Grade::Good => round_half_even(ivl * u64::from(s.ease), 100),
            Grade::Easy => {
                s.ease = (s.ease + EASY_EASE_BONUS).min(MAX_EASE);
                round_half_even(ivl * u64::from(s.ease) * EASY_BONUS_FACTOR, 100 * 100)
            }
        };
        s.interval = u32::try_from(interval)
            .unwrap_or(u32::MAX)
            .clamp(1, self.max_interval);
        s.due = Some(days_after(now, s.interval));
        s
    }

    fn step_delay(&self, step: u32) -> Duration {
        let last = self.learning_steps.len() - 1;
        let idx = (step as usize).min(last);
        Duration::minutes(i64::from(self.learning_steps[idx]))
    }
}

/// `num / den` rounded to the nearest integer, ties to even.
fn round_half_even(num: u64, den: u64) -> u64 {
    let quotient = num / den;
    let twice_rem = (num % den) * 2;
    if twice_rem > den || (twice_rem == den && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 14, 37, 12).unwrap()
    }

    fn tomorrow() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap()
    }

    fn learning(step: u32) -> ScheduleState {
        ScheduleState {
            state: CardState::Learning,
            step,
            due: Some(now()),
            ..ScheduleState::default()
        }
    }

    fn review(interval: u32, ease: u32, lapses: u32) -> ScheduleState {
        ScheduleState {
            state: CardState::Review,
            step: 0,
            interval,
            ease,
            lapses,
            due: Some(now()),
        }
    }

    #[test]
    fn test_new_good_enters_learning() {
        let next = Scheduler::default().next(&ScheduleState::default(), Grade::Good, now());
        assert_eq!(next.state, CardState::Learning);
        assert_eq!(next.step, 1);
        assert_eq!(next.due, Some(now() + Duration::minutes(10)));
    }

    #[test]
    fn test_new_again_and_hard_use_first_rung() {
        let sched = Scheduler::default();
        for grade in [Grade::Again, Grade::Hard] {
            let next = sched.next(&ScheduleState::default(), grade, now());
            assert_eq!(next.state, CardState::Learning);
            assert_eq!(next.step, 0);
            assert_eq!(next.due, Some(now() + Duration::minutes(1)));
        }
    }

    #[test]
    fn test_learning_again_restarts_ladder() {
        let next = Scheduler::default().next(&learning(1), Grade::Again, now());
        assert_eq!(next.state, CardState::Learning);
        assert_eq!(next.step, 0);
        assert_eq!(next.due, Some(now() + Duration::minutes(1)));
    }

    #[test]
    fn test_learning_hard_repeats_rung() {
        let next = Scheduler::default().next(&learning(1), Grade::Hard, now());
        assert_eq!(next.step, 1);
        assert_eq!(next.due, Some(now() + Duration::minutes(10)));
    }

    #[test]
    fn test_learning_hard_clamps_stale_step() {
        // A step beyond the ladder, e.g. left over from a longer ladder.
        let next = Scheduler::default().next(&learning(5), Grade::Hard, now());
        assert_eq!(next.step, 5);
        assert_eq!(next.due, Some(now() + Duration::minutes(10)));
    }

    #[test]
    fn test_last_rung_good_graduates() {
        let next = Scheduler::default().next(&learning(1), Grade::Good, now());
        assert_eq!(next.state, CardState::Review);
        assert_eq!(next.interval, 1);
        assert_eq!(next.due, Some(tomorrow()));
    }

    #[test]
    fn test_easy_graduates_from_any_step() {
        let sched = Scheduler::default();
        for start in [ScheduleState::default(), learning(0), learning(1)] {
            let next = sched.next(&start, Grade::Easy, now());
            assert_eq!(next.state, CardState::Review);
            assert_eq!(next.interval, 3);
            assert_eq!(next.due, Some(tomorrow() + Duration::days(2)));
        }
    }

    #[test]
    fn test_graduation_keeps_ease_and_lapses() {
        let mut start = learning(1);
        start.ease = 190;
        start.lapses = 2;
        let next = Scheduler::default().next(&start, Grade::Good, now());
        assert_eq!(next.ease, 190);
        assert_eq!(next.lapses, 2);
    }

    #[test]
    fn test_review_good_multiplies_by_ease() {
        let next = Scheduler::default().next(&review(10, 250, 0), Grade::Good, now());
        assert_eq!(next.state, CardState::Review);
        assert_eq!(next.interval, 25);
        assert_eq!(next.ease, 250);
        assert_eq!(next.due, Some(tomorrow() + Duration::days(24)));
    }

    #[test]
    fn test_review_again_lapses() {
        let next = Scheduler::default().next(&review(10, 250, 0), Grade::Again, now());
        assert_eq!(next.state, CardState::Review);
        assert_eq!(next.interval, 1);
        assert_eq!(next.ease, 130);
        assert_eq!(next.lapses, 1);
        assert_eq!(next.due, Some(tomorrow()));
    }

    #[test]
    fn test_repeated_again_counts_each_lapse() {
        let sched = Scheduler::default();
        let mut s = review(40, 300, 0);
        for expected in 1..=4 {
            s = sched.next(&s, Grade::Again, now());
            assert_eq!(s.lapses, expected);
            assert_eq!(s.interval, 1);
            assert_eq!(s.state, CardState::Review);
        }
    }

    #[test]
    fn test_review_hard() {
        let next = Scheduler::default().next(&review(10, 250, 0), Grade::Hard, now());
        assert_eq!(next.interval, 12);
        assert_eq!(next.ease, 130);

        let next = Scheduler::default().next(&review(1, 300, 0), Grade::Hard, now());
        // 1 * 1.2 = 1.2 rounds down, but never below one day
        assert_eq!(next.interval, 1);
        assert_eq!(next.ease, 150);
    }

    #[test]
    fn test_review_easy_uses_raised_ease() {
        let next = Scheduler::default().next(&review(10, 250, 0), Grade::Easy, now());
        assert_eq!(next.ease, 350);
        // 10 * 3.50 * 1.3 = 45.5, ties to even
        assert_eq!(next.interval, 46);

        let next = Scheduler::default().next(&review(4, 150, 0), Grade::Easy, now());
        assert_eq!(next.ease, 300);
        // 4 * 3.00 * 1.3 = 15.6
        assert_eq!(next.interval, 16);
    }

    #[test]
    fn test_ease_capped_at_max() {
        let next = Scheduler::default().next(&review(10, 300, 0), Grade::Easy, now());
        assert_eq!(next.ease, 350);
    }

    #[test]
    fn test_review_good_rounds_half_to_even() {
        let sched = Scheduler::default();
        // 1 * 2.50 = 2.5 -> 2 ; 3 * 2.50 = 7.5 -> 8
        assert_eq!(sched.next(&review(1, 250, 0), Grade::Good, now()).interval, 2);
        assert_eq!(sched.next(&review(3, 250, 0), Grade::Good, now()).interval, 8);
    }

    #[test]
    fn test_stored_values_are_normalized() {
        let sched = Scheduler::default();
        let next = sched.next(&review(0, 900, 0), Grade::Good, now());
        assert_eq!(next.ease, 350);
        assert!(next.interval >= 1);
    }

    #[test]
    fn test_max_interval_caps_growth() {
        let sched = Scheduler::default().with_max_interval(30);
        let next = sched.next(&review(20, 250, 0), Grade::Good, now());
        assert_eq!(next.interval, 30);
    }

    #[test]
    fn test_small_max_interval_keeps_easy_graduation() {
        let sched = Scheduler::default().with_max_interval(1);
        let next = sched.next(&ScheduleState::default(), Grade::Easy, now());
        assert_eq!(next.state, CardState::Review);
        assert_eq!(next.interval, 3);
        assert_eq!(next.due, Some(Utc.with_ymd_and_hms(2024, 6, 18, 0, 0, 0).unwrap()));

        let next = sched.next(&review(20, 250, 0), Grade::Good, now());
        assert_eq!(next.interval, 3);
    }

    #[test]
    fn test_custom_ladder() {
        let sched = Scheduler::with_learning_steps(vec![5, 30, 120]).unwrap();
        let s1 = sched.next(&ScheduleState::default(), Grade::Good, now());
        assert_eq!(s1.due, Some(now() + Duration::minutes(30)));
        let s2 = sched.next(&s1, Grade::Good, now());
        assert_eq!(s2.step, 2);
        assert_eq!(s2.due, Some(now() + Duration::minutes(120)));
        let s3 = sched.next(&s2, Grade::Good, now());
        assert_eq!(s3.state, CardState::Review);
    }

    #[test]
    fn test_invalid_ladders_rejected() {
        assert!(Scheduler::with_learning_steps(vec![]).is_err());
        assert!(Scheduler::with_learning_steps(vec![1, 0]).is_err());
    }

    #[test]
    fn test_preview_lists_every_grade() {
        let preview = Scheduler::default().preview(&review(10, 250, 0), now());
        let intervals: Vec<_> = preview.iter().map(|(_, s)| s.interval).collect();
        assert_eq!(preview[0].0, Grade::Again);
        assert_eq!(intervals, vec![1, 12, 25, 46]);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(25, 10), 2);
        assert_eq!(round_half_even(35, 10), 4);
        assert_eq!(round_half_even(26, 10), 3);
        assert_eq!(round_half_even(24, 10), 2);
        assert_eq!(round_half_even(0, 100), 0);
    }

    fn any_grade() -> impl Strategy<Value = Grade> {
        prop::sample::select(Grade::ALL.to_vec())
    }

    fn any_state() -> impl Strategy<Value = ScheduleState> {
        (
            prop::sample::select(vec![CardState::New, CardState::Learning, CardState::Review]),
            0u32..4,
            0u32..=DEFAULT_MAX_INTERVAL,
            0u32..500,
            0u32..50,
        )
            .prop_map(|(state, step, interval, ease, lapses)| ScheduleState {
                state,
                step,
                interval,
                ease,
                lapses,
                due: None,
            })
    }

    proptest! {
        #[test]
        fn prop_ease_stays_in_bounds(state in any_state(), grade in any_grade()) {
            let next = Scheduler::default().next(&state, grade, now());
            prop_assert!((MIN_EASE..=MAX_EASE).contains(&next.ease));
        }

        #[test]
        fn prop_review_interval_at_least_one(state in any_state(), grade in any_grade()) {
            let next = Scheduler::default().next(&state, grade, now());
            if next.state == CardState::Review {
                prop_assert!(next.interval >= 1);
            }
        }

        #[test]
        fn prop_due_never_in_past(state in any_state(), grade in any_grade()) {
            let next = Scheduler::default().next(&state, grade, now());
            prop_assert!(next.due.is_some_and(|due| due >= now()));
        }

        #[test]
        fn prop_review_due_is_day_aligned(state in any_state(), grade in any_grade()) {
            let next = Scheduler::default().next(&state, grade, now());
            if next.state == CardState::Review {
                let due = next.due.unwrap();
                prop_assert_eq!(due, crate::clock::day_floor(due));
                prop_assert_eq!(due, days_after(now(), next.interval));
            }
        }

        #[test]
        fn prop_review_cards_never_demoted(state in any_state(), grade in any_grade()) {
            let mut state = state;
            state.state = CardState::Review;
            let next = Scheduler::default().next(&state, grade, now());
            prop_assert_eq!(next.state, CardState::Review);
        }
    }
}
