//! Domain services for the jobsync backend.
//!
//! Services contain pure business logic that operates on domain models.

pub mod mapper;

pub use mapper::map_job;
