//! Shared helpers with no knowledge of the build pipeline.

pub mod hash;
pub mod mime;
pub mod path;
pub mod timeout;
