//! Price alignment: asof join against reference rates and conversion.

pub mod asof;
pub mod convert;

pub use asof::AsofJoiner;
pub use convert::{ConversionTable, PriceConverter};
