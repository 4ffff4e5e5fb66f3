//! Workload simulator.
//!
//! Projects daily review volume by replaying the scheduler over a private
//! copy of the items: each due item is recalled with probability `retention`
//! (rated good) or forgotten (rated fail), and new items are introduced at a
//! fixed daily pace. The caller's items are never touched.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::engine::{ReviewContext, Scheduler};
use super::mastery::effective_mastery;
use crate::config::{validate_retention, SimulationConfig};
use crate::error::Result;
use crate::models::{DeckId, Rating, ReviewLog, Reviewable};
use crate::util::end_of_day;

/// Inputs of one projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationRequest {
    pub days: u32,
    pub new_items_per_day: u32,
    pub retention: f64,
    pub seed: u64,
}

impl SimulationRequest {
    /// Build a request from config, drawing a random seed when none is fixed
    pub fn from_config(config: &SimulationConfig, days: u32) -> Self {
        Self {
            days,
            new_items_per_day: config.new_items_per_day,
            retention: config.retention,
            seed: config.seed.unwrap_or_else(rand::random),
        }
    }
}

/// Projected load for one simulated day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLoad {
    /// Zero-based offset from the start date
    pub day: u32,
    pub date: NaiveDate,
    pub reviews: u32,
    pub new_items: u32,
    pub total: u32,
    /// Mean effective mastery over introduced items at the end of the day
    pub mean_mastery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProjection {
    pub days: Vec<DayLoad>,
}

impl WorkloadProjection {
    pub fn peak_load(&self) -> u32 {
        self.days.iter().map(|day| day.total).max().unwrap_or(0)
    }

    pub fn mean_load(&self) -> f64 {
        if self.days.is_empty() {
            return 0.0;
        }
        let total: f64 = self.days.iter().map(|day| f64::from(day.total)).sum();
        total / f64::from(u32::try_from(self.days.len()).unwrap_or(u32::MAX))
    }

    pub fn total_reviews(&self) -> u64 {
        self.days.iter().map(|day| u64::from(day.reviews)).sum()
    }
}

/// Run a forward projection starting on the day containing `start`.
///
/// Never-reviewed, non-suspended input items form the new-item queue; once it
/// runs dry, fresh placeholder items are synthesized so the requested pace
/// is always honored.
pub fn simulate(
    items: &[Reviewable],
    request: &SimulationRequest,
    scheduler: &Scheduler,
    start: DateTime<Utc>,
) -> Result<WorkloadProjection> {
    validate_retention(request.retention)?;

    let mut rng = StdRng::seed_from_u64(request.seed);
    let context = ReviewContext {
        deck_id: DeckId::new(),
        series_id: None,
    };

    let (mut queue, mut active): (Vec<Reviewable>, Vec<Reviewable>) = items
        .iter()
        .filter(|item| !item.suspended)
        .cloned()
        .partition(Reviewable::is_new);
    queue.reverse();

    let mut days = Vec::with_capacity(usize::try_from(request.days).unwrap_or_default());
    for day in 0..request.days {
        let today = start + Duration::days(i64::from(day));
        let cutoff = end_of_day(today);

        let mut reviews = 0;
        for item in &mut active {
            if item.due_date <= cutoff {
                let rating = recall(&mut rng, request.retention);
                *item = scheduler.schedule(item, Some(rating), context, today).item;
                reviews += 1;
            }
        }

        for _ in 0..request.new_items_per_day {
            let fresh = queue
                .pop()
                .unwrap_or_else(|| Reviewable::new("", "", today));
            let rating = recall(&mut rng, request.retention);
            active.push(scheduler.schedule(&fresh, Some(rating), context, today).item);
        }

        days.push(DayLoad {
            day,
            date: today.date_naive(),
            reviews,
            new_items: request.new_items_per_day,
            total: reviews + request.new_items_per_day,
            mean_mastery: mean_mastery(&active, cutoff),
        });
    }

    tracing::debug!(
        "Simulated {} days over {} items (seed {})",
        request.days,
        items.len(),
        request.seed
    );
    Ok(WorkloadProjection { days })
}

/// Share of rated reviews that were not failures; `None` without rated history.
pub fn observed_retention(logs: &[ReviewLog]) -> Option<f64> {
    let (recalled, rated) = logs
        .iter()
        .filter_map(|log| log.rating)
        .fold((0_u32, 0_u32), |(recalled, rated), rating| {
            (
                recalled + u32::from(rating != Rating::Fail),
                rated + 1,
            )
        });

    (rated > 0).then(|| f64::from(recalled) / f64::from(rated))
}

fn recall(rng: &mut StdRng, retention: f64) -> Rating {
    if rng.gen_bool(retention) {
        Rating::Good
    } else {
        Rating::Fail
    }
}

fn mean_mastery(items: &[Reviewable], at: DateTime<Utc>) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let sum: f64 = items.iter().map(|item| effective_mastery(item, at)).sum();
    sum / f64::from(u32::try_from(items.len()).unwrap_or(u32::MAX))
}
