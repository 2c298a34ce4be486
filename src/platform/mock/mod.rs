//! Mock platform implementations for testing

pub mod storage;

pub use storage::MockStorage;
