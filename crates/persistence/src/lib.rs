//! Persistence layer for the jobsync backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage seams
//! - In-memory store implementations for tests and local development

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;
