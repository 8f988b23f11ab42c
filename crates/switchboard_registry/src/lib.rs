//! Capability registry: a concurrency-safe catalog of tools and the
//! factories that build them, with schema validation and timeout-bounded
//! execution.

pub mod builtin;
pub mod factory;
pub mod orphan;
pub mod registry;
pub mod validate;

pub use factory::{LoadError, LoadFailure, RegistryError, ToolFactory};
pub use orphan::OrphanSupervisor;
pub use registry::Registry;
