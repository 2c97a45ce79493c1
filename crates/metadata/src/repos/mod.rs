//! Repository traits for metadata operations.

pub mod files;
pub mod heartbeats;
pub mod tokens;

pub use files::FileRepo;
pub use heartbeats::HeartbeatRepo;
pub use tokens::TokenRepo;
