//! Client-side sync layer for the Tinnitus pal community: paginated,
//! cache-first reads of post feeds and comment threads, and single-flight
//! mutations that invalidate what they change.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
