//! # Blogly Infrastructure
//!
//! Concrete implementations of the ports defined in `blogly-core`.
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL store via SeaORM
//!
//! The in-memory store is always available and needs no external services.

pub mod database;

pub use database::{DatabaseConfig, InMemoryBlogStore};

#[cfg(feature = "postgres")]
pub use database::PostgresBlogStore;
