//! HTTP request handlers.

pub mod files;
pub mod heartbeat;
pub mod list;
pub mod upload;

pub use files::*;
pub use heartbeat::*;
pub use list::*;
pub use upload::*;
