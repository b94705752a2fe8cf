//! AT parameter access: descriptor table, async engine, blocking adapter.

pub mod blocking;
pub mod engine;
pub mod param;

pub use blocking::{AtBlocking, BlockingConfig};
pub use engine::AtCommandEngine;
pub use param::{AtStatus, Param};
