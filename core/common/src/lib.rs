//! Common utilities and types shared across tabstore crates.
//!
//! This module provides the error taxonomy and the logical store identity
//! used by drivers, the orchestrator and the cross-tab channel.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ensure_application_key, StorageIdentity, EVENT_KEY, RESERVED_PREFIX};
