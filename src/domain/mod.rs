//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod relative_time;
pub mod types;
pub mod users;
