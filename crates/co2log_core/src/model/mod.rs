//! Domain model layer.
//!
//! # Responsibility
//! - Define the carbon-intensity observation shared by both sink strategies.
//! - Own the delimited row format used by staged and persisted artifacts.
//!
//! # Invariants
//! - A record is immutable once produced.
//! - Row serialization is deterministic and newline-terminated.

pub mod record;
