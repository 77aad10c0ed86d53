//! Action processor (C6): the single entry point through which every agent
//! command is validated, applied, and audited.

pub mod processor;

pub use processor::{ActionContext, ActionProcessor, PendingFill, PendingFillQueue};
