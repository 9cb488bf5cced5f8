//! Driver abstraction for tabstore.
//!
//! This module provides the trait every key-value backend implements, the
//! shared storage area that backs cross-context notification, two reference
//! drivers, and a registry for resolving drivers by name.
//!
//! # Design Principles
//! - Backend isolation: no driver-specific logic in the orchestrator
//! - Async operations: every data operation is async
//! - Pure capability probe: `is_supported` never touches async state
//! - Unified error semantics: drivers report failures through the common `Error`

pub mod area;
pub mod area_driver;
pub mod driver;
pub mod memory;
pub mod registry;
pub mod serializer;

pub use area::{AreaChange, AreaContext, AreaSubscription, ContextId, StorageArea};
pub use area_driver::AreaDriver;
pub use driver::{Driver, IterateFn};
pub use memory::MemoryDriver;
pub use registry::{create_default_registry, DriverFactory, DriverRegistry};
pub use serializer::{JsonSerializer, Serializer};
