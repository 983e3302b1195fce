//! Repository implementations of the domain storage seams.

pub mod job;
pub mod sync_state;

pub use job::JobRepository;
pub use sync_state::SyncStateRepository;
