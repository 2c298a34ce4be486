//! Durable storage interface trait
//!
//! This module defines the byte-addressable storage interface the
//! configuration store persists into. On real hardware this is an EEPROM
//! or a flash page driven through an EEPROM-emulation layer.
//!
//! # Storage Characteristics
//!
//! - Fixed, small capacity (the configuration layout targets 4 KiB)
//! - Byte-granular reads and writes; a write replaces the addressed bytes
//!   (EEPROM semantics, no erase-before-write requirement on the caller)
//! - `erase()` resets the whole region to 0xFF
//! - Operations are blocking and may take tens of milliseconds; callers
//!   must treat bulk rewrite (commit/load/reset) as exclusive sections
//!
//! # Safety Invariants
//!
//! - Only one owner per storage instance (no concurrent access)
//! - Implementations must validate offsets against the region bounds

use crate::platform::Result;

/// Byte-addressable durable storage
pub trait StorageInterface {
    /// Read `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::OutOfBounds` if the range exceeds the region,
    /// `StorageError::ReadFailed` if the underlying read fails.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `offset`, replacing the addressed bytes.
    ///
    /// Each call is expected to be self-contained: an interrupted sequence
    /// of writes leaves all fully written ranges intact.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::OutOfBounds` if the range exceeds the region,
    /// `StorageError::WriteFailed` if the underlying write fails.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()>;

    /// Erase the whole region, setting every byte to 0xFF.
    fn erase(&mut self) -> Result<()>;

    /// Total capacity of the region in bytes.
    fn capacity(&self) -> u32;
}
