// FILE: src/shares/mod.rs
pub mod registry;
pub mod store;

pub use registry::{JsonShareRegistry, RegistryFuture, ShareRegistry};
pub use store::{Share, ShareStore};
