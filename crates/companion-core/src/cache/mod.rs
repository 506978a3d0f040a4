//! Persistent registry lookup cache.

mod log;
mod store;

pub use log::{escape_field, AppendLog};
pub use store::{CachedVersion, ResourceCache};
