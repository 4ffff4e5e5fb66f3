//! SM-2 family scheduling engine.
//!
//! Ratings:
//! - fail: lapse recorded, interval drops to the relearning value, ease penalized
//! - hard: interval grows by a small multiplier, ease lightly penalized
//! - good: interval multiplied by the ease factor
//! - easy: interval multiplied by ease and the easy bonus, ease raised
//!
//! A `None` rating suspends the item and leaves its schedule untouched.
//! The engine is pure; leech remediation belongs to the caller.

use chrono::{DateTime, Utc};

use super::leech::is_leech;
use super::mastery::{blend_mastery, effective_mastery};
use crate::config::{SchedulerParams, StudyConfig};
use crate::models::{DeckId, Rating, ReviewId, ReviewLog, Reviewable, SeriesId};
use crate::util::due_after_days;

/// Where a review happened, recorded in its log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewContext {
    pub deck_id: DeckId,
    pub series_id: Option<SeriesId>,
}

/// New item state plus the log entry describing the transition
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReview {
    pub item: Reviewable,
    pub log: ReviewLog,
    /// Derived from the leech detector; remediation is up to the caller
    pub is_leech: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduler {
    params: SchedulerParams,
    leech_threshold: u32,
}

impl Scheduler {
    pub const fn new(params: SchedulerParams, leech_threshold: u32) -> Self {
        Self {
            params,
            leech_threshold,
        }
    }

    pub const fn from_config(config: &StudyConfig) -> Self {
        Self::new(config.scheduler, config.leech.threshold)
    }

    /// Apply one rating (or a suspend when `rating` is `None`) to `item`.
    pub fn schedule(
        &self,
        item: &Reviewable,
        rating: Option<Rating>,
        context: ReviewContext,
        now: DateTime<Utc>,
    ) -> ScheduledReview {
        let mut next = item.clone();

        let logged_mastery = match rating {
            None => {
                next.suspended = true;
                effective_mastery(item, now)
            }
            Some(rating) => {
                let step = self.next_step(item, rating);
                let mastery = blend_mastery(
                    effective_mastery(item, now),
                    rating,
                    self.params.mastery_weight,
                );

                next.interval = step.interval;
                next.ease_factor = step.ease_factor;
                next.lapses = step.lapses;
                next.due_date = due_after_days(now, step.interval);
                next.review_count = item.review_count.saturating_add(1);
                next.last_reviewed = Some(now);
                next.mastery_level = Some(mastery);
                mastery
            }
        };

        let log = ReviewLog {
            id: ReviewId::new(),
            item_id: item.id,
            deck_id: context.deck_id,
            series_id: context.series_id,
            reviewed_at: now,
            rating,
            interval: next.interval,
            ease_factor: next.ease_factor,
            mastery: logged_mastery,
        };

        let is_leech = is_leech(&next, self.leech_threshold);
        ScheduledReview {
            item: next,
            log,
            is_leech,
        }
    }

    /// Interval each rating would produce, ordered fail, hard, good, easy.
    pub fn preview_intervals(&self, item: &Reviewable) -> [u32; 4] {
        Rating::ALL.map(|rating| self.next_step(item, rating).interval)
    }

    fn next_step(&self, item: &Reviewable, rating: Rating) -> Step {
        let params = &self.params;
        // First-ever review starts from interval 0 with the neutral ease.
        let (previous, ease) = if item.is_new() {
            (0, params.starting_ease)
        } else {
            (item.interval, item.ease_factor.max(params.ease_floor))
        };

        let (interval, ease_factor, lapses) = match rating {
            Rating::Fail => (
                params.relearn_interval,
                ease - params.fail_penalty,
                item.lapses.saturating_add(1),
            ),
            Rating::Hard => (
                grow(previous, params.hard_multiplier).max(1),
                ease - params.hard_penalty,
                item.lapses,
            ),
            Rating::Good => {
                let interval = if previous == 0 { 1 } else { grow(previous, ease) };
                (interval, ease, item.lapses)
            }
            Rating::Easy => (
                grow(previous.max(1), ease * params.easy_bonus).max(previous.saturating_add(1)),
                ease + params.easy_gain,
                item.lapses,
            ),
        };

        Step {
            interval: interval.min(params.max_interval),
            ease_factor: ease_factor.max(params.ease_floor),
            lapses,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&StudyConfig::default())
    }
}

struct Step {
    interval: u32,
    ease_factor: f64,
    lapses: u32,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range first
fn grow(interval: u32, factor: f64) -> u32 {
    let scaled = (f64::from(interval) * factor).round();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else {
        scaled.min(f64::from(u32::MAX)) as u32
    }
}

/// Format an interval in days to a compact human-readable string
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{days}d"),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MIN_EASE_FACTOR;
    use crate::util::end_of_day;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 15, 30, 0).unwrap()
    }

    fn context() -> ReviewContext {
        ReviewContext {
            deck_id: DeckId::new(),
            series_id: None,
        }
    }

    fn reviewed_item(interval: u32, ease_factor: f64, lapses: u32) -> Reviewable {
        let mut item = Reviewable::new("q", "a", now() - Duration::days(i64::from(interval)));
        item.interval = interval;
        item.ease_factor = ease_factor;
        item.lapses = lapses;
        item.review_count = 4;
        item.mastery_level = Some(0.7);
        item.last_reviewed = Some(now() - Duration::days(i64::from(interval)));
        item
    }

    #[test]
    fn test_good_multiplies_by_ease() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(&reviewed_item(6, 2.5, 0), Some(Rating::Good), context(), now());

        assert_eq!(result.item.interval, 15);
        assert!((result.item.ease_factor - 2.5).abs() < 1e-12);
        assert_eq!(result.item.lapses, 0);
        assert_eq!(result.item.due_date, end_of_day(now() + Duration::days(15)));
        assert_eq!(result.item.last_reviewed, Some(now()));
        assert_eq!(result.item.review_count, 5);
    }

    #[test]
    fn test_good_at_the_ease_floor_can_hold_the_interval() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(
            &reviewed_item(1, MIN_EASE_FACTOR, 3),
            Some(Rating::Good),
            context(),
            now(),
        );
        // round(1 * 1.3) = 1
        assert_eq!(result.item.interval, 1);
        assert_eq!(scheduler.preview_intervals(&reviewed_item(1, MIN_EASE_FACTOR, 3))[2], 1);
    }

    #[test]
    fn test_fail_resets_interval_and_penalizes_ease() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(&reviewed_item(6, 2.5, 0), Some(Rating::Fail), context(), now());

        assert_eq!(result.item.lapses, 1);
        assert_eq!(result.item.interval, 1);
        assert!((result.item.ease_factor - 2.3).abs() < 1e-12);
        assert_eq!(result.item.due_date, end_of_day(now() + Duration::days(1)));
    }

    #[test]
    fn test_fail_ease_is_floored() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(&reviewed_item(3, 1.35, 2), Some(Rating::Fail), context(), now());
        assert!((result.item.ease_factor - MIN_EASE_FACTOR).abs() < 1e-12);
        assert_eq!(result.item.lapses, 3);
    }

    #[test]
    fn test_ease_never_below_floor_for_any_rating_sequence() {
        let scheduler = Scheduler::default();
        let mut item = Reviewable::new("q", "a", now());
        let sequence = [
            Rating::Fail,
            Rating::Hard,
            Rating::Fail,
            Rating::Hard,
            Rating::Hard,
            Rating::Fail,
            Rating::Good,
            Rating::Fail,
            Rating::Easy,
            Rating::Hard,
        ];
        for (offset, rating) in sequence.iter().cycle().take(60).enumerate() {
            let at = now() + Duration::days(i64::try_from(offset).unwrap());
            let lapses = item.lapses;
            item = scheduler.schedule(&item, Some(*rating), context(), at).item;
            assert!(item.ease_factor >= MIN_EASE_FACTOR);
            if *rating == Rating::Fail {
                assert_eq!(item.lapses, lapses + 1);
                assert!(item.interval <= 1);
            } else {
                assert_eq!(item.lapses, lapses);
            }
        }
    }

    #[test]
    fn test_hard_grows_sub_linearly() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(&reviewed_item(10, 2.5, 0), Some(Rating::Hard), context(), now());
        assert_eq!(result.item.interval, 12);
        assert!((result.item.ease_factor - 2.35).abs() < 1e-12);
    }

    #[test]
    fn test_easy_applies_bonus_and_raises_ease() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(&reviewed_item(10, 2.5, 0), Some(Rating::Easy), context(), now());
        // 10 * 2.5 * 1.3 = 32.5 -> 33
        assert_eq!(result.item.interval, 33);
        assert!((result.item.ease_factor - 2.65).abs() < 1e-12);
    }

    #[test]
    fn test_first_review_uses_neutral_start() {
        let scheduler = Scheduler::default();
        let mut item = Reviewable::new("q", "a", now());
        item.interval = 9;
        item.ease_factor = 1.9;

        let good = scheduler.schedule(&item, Some(Rating::Good), context(), now());
        assert_eq!(good.item.interval, 1);
        assert!((good.item.ease_factor - 2.5).abs() < 1e-12);

        let easy = scheduler.schedule(&item, Some(Rating::Easy), context(), now());
        assert_eq!(easy.item.interval, 3);
    }

    #[test]
    fn test_suspend_leaves_schedule_untouched() {
        let scheduler = Scheduler::default();
        let item = reviewed_item(6, 2.5, 1);
        let result = scheduler.schedule(&item, None, context(), now());

        assert!(result.item.suspended);
        assert_eq!(result.item.interval, item.interval);
        assert_eq!(result.item.due_date, item.due_date);
        assert!((result.item.ease_factor - item.ease_factor).abs() < f64::EPSILON);
        assert_eq!(result.item.lapses, item.lapses);
        assert_eq!(result.log.rating, None);
    }

    #[test]
    fn test_every_call_yields_matching_log() {
        let scheduler = Scheduler::default();
        let ctx = ReviewContext {
            deck_id: DeckId::new(),
            series_id: Some(SeriesId::new()),
        };
        let item = reviewed_item(6, 2.5, 0);
        let result = scheduler.schedule(&item, Some(Rating::Good), ctx, now());

        assert_eq!(result.log.item_id, item.id);
        assert_eq!(result.log.deck_id, ctx.deck_id);
        assert_eq!(result.log.series_id, ctx.series_id);
        assert_eq!(result.log.rating, Some(Rating::Good));
        assert_eq!(result.log.interval, result.item.interval);
        assert_eq!(Some(result.log.mastery), result.item.mastery_level);
    }

    #[test]
    fn test_mastery_moves_toward_rating_target() {
        let scheduler = Scheduler::default();
        let item = reviewed_item(6, 2.5, 0);
        let easy = scheduler.schedule(&item, Some(Rating::Easy), context(), now());
        let fail = scheduler.schedule(&item, Some(Rating::Fail), context(), now());
        let easy_mastery = easy.item.mastery_level.unwrap();
        let fail_mastery = fail.item.mastery_level.unwrap();

        assert!(easy_mastery > 0.7 && easy_mastery < 1.0);
        assert!(fail_mastery < 0.7 && fail_mastery > 0.0);
    }

    #[test]
    fn test_leech_flag_is_reported() {
        let scheduler = Scheduler::new(SchedulerParams::default(), 3);
        let result = scheduler.schedule(&reviewed_item(2, 2.0, 2), Some(Rating::Fail), context(), now());
        assert!(result.is_leech);
        assert!(!result.item.suspended);
    }

    #[test]
    fn test_interval_is_capped() {
        let params = SchedulerParams {
            max_interval: 30,
            ..SchedulerParams::default()
        };
        let scheduler = Scheduler::new(params, 8);
        let result = scheduler.schedule(&reviewed_item(20, 2.5, 0), Some(Rating::Easy), context(), now());
        assert_eq!(result.item.interval, 30);
    }

    #[test]
    fn test_preview_intervals() {
        let scheduler = Scheduler::default();
        assert_eq!(
            scheduler.preview_intervals(&reviewed_item(6, 2.5, 0)),
            [1, 7, 15, 20]
        );
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }
}
