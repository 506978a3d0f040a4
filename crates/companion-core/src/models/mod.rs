//! Data model: decoded records and the resources they reference.

mod record;
mod resource;

pub use record::{Dialect, MetadataRecord};
pub use resource::{format_weight, ResourceKind, ResourceRef};
