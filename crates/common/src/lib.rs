//! Common types shared by the Certflow crates.

pub mod ids;
pub mod observability;

pub use ids::{NodeId, RunId, WorkflowId};
pub use observability::{init_tracing, LogFormat};
