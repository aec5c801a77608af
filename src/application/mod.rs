//! Application services: feeds, threads and community mutations.

pub mod comments;
pub mod context;
pub mod error;
pub mod groups;
pub mod posts;
pub mod repos;
