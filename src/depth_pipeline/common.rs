//! Common types module
//!
//! Frame and depth rasters, stream parameters and the shared error type.

pub mod error;
pub mod types;

pub use error::{DepthError, Result};
pub use types::{ChannelOrder, DepthMap, Frame, MediaParams};
