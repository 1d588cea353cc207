//! Error codes shared by the sync core and its adapters.

pub mod error_code;

pub use error_code::ErrorCode;
