//! Ordered per-key series and timestamp handling.

pub mod store;
pub mod timestamp;

pub use store::*;
pub use timestamp::*;
