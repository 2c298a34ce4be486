//! Platform abstraction layer
//!
//! This module provides the hardware abstraction the gateway core depends
//! on. The only peripheral the core itself needs is a small durable byte
//! region (EEPROM or EEPROM-emulating flash) for configuration storage.

pub mod error;
pub mod traits;

// Mock implementations (host tests and SITL-style harnesses)
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{PlatformError, Result, StorageError};
pub use traits::StorageInterface;
