//! Tick scheduler & pipeline (C7): the single logical worker that advances
//! simulation time, settles matched fills, evolves market state, and fans
//! out events.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{TickOutcome, TickPipeline};
pub use scheduler::{SchedulerMode, TickScheduler};
