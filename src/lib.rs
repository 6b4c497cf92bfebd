//! Laboratory notebook core: entity collections over a key-value store, a
//! read-through cache with change notifications, mind maps with a
//! force-directed layout, and an assistant chat with an offline fallback.

pub mod assistant;
pub mod cache;
pub mod config;
pub mod error;
pub mod lab;
pub mod layout;
pub mod mindmap;
pub mod model;
pub mod store;
pub mod util;

pub use config::LabConfig;
pub use error::{LabError, LabResult};
pub use lab::Lab;
