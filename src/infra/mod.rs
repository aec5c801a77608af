//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod navigation;
pub mod rest;
pub mod telemetry;
