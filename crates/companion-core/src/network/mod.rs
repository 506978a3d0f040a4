//! Remote registry access.
//!
//! # Module Organization
//!
//! - [`registry`] - The `RegistryClient` trait and its result types
//! - [`civitai`] - `reqwest` implementation against civitai.com
//! - [`gate`] - Minimum-interval gate shared by all remote calls
//! - [`exclusion`] - Ids the user never wants downloaded

pub mod civitai;
pub mod exclusion;
pub mod gate;
pub mod registry;

pub use civitai::CivitaiClient;
pub use exclusion::ExclusionList;
pub use gate::{DynRateGate, IntervalGate, RateGate};
pub use registry::{DynRegistryClient, Lookup, RegistryClient, RegistryVersion};
