//! Review scheduling: mastery decay, leech detection, the SM-2 family engine,
//! and the workload simulator built on top of it.

mod engine;
mod leech;
mod mastery;
mod simulator;

pub use engine::{format_interval, ReviewContext, ScheduledReview, Scheduler};
pub use leech::{apply_leech_action, is_leech, LeechOutcome, LEECH_TAG};
pub use mastery::{blend_mastery, effective_mastery, rating_target};
pub use simulator::{observed_retention, simulate, DayLoad, SimulationRequest, WorkloadProjection};
