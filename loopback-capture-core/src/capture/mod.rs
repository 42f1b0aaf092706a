//! Capture negotiation: the strategy adapters, the plan that orders them and
//! the cascade that folds over the plan.

pub mod cascade;
pub mod device;
pub mod display;
pub mod host_shell;
pub mod microphone;
pub mod plan;
pub mod remediation;

pub use cascade::{run_cascade, CaptureResult};
pub use plan::{plan_strategies, Collaborators};
