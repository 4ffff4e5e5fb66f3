//! Mastery model: forgetting-curve decay of the last recorded mastery.

use std::f64::consts::LN_2;

use chrono::{DateTime, Utc};

use crate::models::{Rating, Reviewable};
use crate::util::elapsed_days;

/// Effective mastery of `item` at `now`, always within [0, 1].
///
/// Never-reviewed items score 0. Up to the scheduled interval the recorded
/// value holds; past it, the value halves for every further interval elapsed.
pub fn effective_mastery(item: &Reviewable, now: DateTime<Utc>) -> f64 {
    let (Some(last_reviewed), Some(recorded)) = (item.last_reviewed, item.mastery_level) else {
        return 0.0;
    };

    let recorded = clamp_unit(recorded);
    let half_life = f64::from(item.interval.max(1));
    let overdue = elapsed_days(last_reviewed, now) - half_life;
    if overdue <= 0.0 {
        return recorded;
    }

    clamp_unit(recorded * (-LN_2 * overdue / half_life).exp())
}

/// Mastery a rating pulls toward
pub const fn rating_target(rating: Rating) -> f64 {
    match rating {
        Rating::Fail => 0.0,
        Rating::Hard => 0.5,
        Rating::Good => 0.8,
        Rating::Easy => 1.0,
    }
}

/// Weighted blend of the previous effective mastery and the rating target.
pub fn blend_mastery(previous: f64, rating: Rating, weight: f64) -> f64 {
    let weight = clamp_unit(weight);
    clamp_unit((1.0 - weight).mul_add(clamp_unit(previous), weight * rating_target(rating)))
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reviewed_item(interval: u32, mastery: f64) -> (Reviewable, DateTime<Utc>) {
        let reviewed_at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let mut item = Reviewable::new("q", "a", reviewed_at);
        item.interval = interval;
        item.mastery_level = Some(mastery);
        item.last_reviewed = Some(reviewed_at);
        (item, reviewed_at)
    }

    #[test]
    fn test_never_reviewed_is_zero() {
        let item = Reviewable::new("q", "a", Utc::now());
        assert!(effective_mastery(&item, Utc::now()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_decay_within_interval() {
        let (item, reviewed_at) = reviewed_item(10, 0.8);
        let value = effective_mastery(&item, reviewed_at + Duration::days(5));
        assert!((value - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_halves_one_interval_past_due() {
        let (item, reviewed_at) = reviewed_item(10, 0.8);
        let value = effective_mastery(&item, reviewed_at + Duration::days(20));
        assert!((value - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_non_increasing_past_due_and_bounded() {
        let (item, reviewed_at) = reviewed_item(3, 0.95);
        let mut previous = f64::INFINITY;
        for day in 0..120 {
            let value = effective_mastery(&item, reviewed_at + Duration::days(day));
            assert!((0.0..=1.0).contains(&value));
            assert!(value <= previous);
            previous = value;
        }
        assert!(previous < 0.01);
    }

    #[test]
    fn test_out_of_range_recorded_value_is_clamped() {
        let (item, reviewed_at) = reviewed_item(1, 3.0);
        assert!((effective_mastery(&item, reviewed_at) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_blend_is_smoothed() {
        let after_easy = blend_mastery(0.0, Rating::Easy, 0.4);
        assert!((after_easy - 0.4).abs() < 1e-12);

        let after_fail = blend_mastery(1.0, Rating::Fail, 0.4);
        assert!((after_fail - 0.6).abs() < 1e-12);

        let mut mastery = 0.0;
        for _ in 0..50 {
            mastery = blend_mastery(mastery, Rating::Good, 0.4);
        }
        assert!((mastery - rating_target(Rating::Good)).abs() < 1e-6);
    }
}
