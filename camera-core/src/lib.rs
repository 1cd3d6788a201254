pub use x_variant as variant;

pub mod buffer;
pub mod error;
pub mod metadata;
pub mod stream;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
