//! Carbon-intensity build plugin.
//!
//! # Responsibility
//! - Produce one timestamped intensity row per build (`row`).
//! - Commit that row through exactly one of two sink strategies (`sink`).
//! - Expose both behind one immutable plugin instance (`co2`).
//!
//! # Invariants
//! - Both strategies serialize rows through the same `RowProducer`.
//! - Configuration is fixed at construction; no hidden shared mutable state.

pub mod co2;
pub mod row;
pub mod sink;

pub use co2::{Co2Plugin, PLUGIN_NAME};
pub use row::RowProducer;
pub use sink::{AppendOutcome, SinkCoordinator, SinkStrategy, StageOutcome};
