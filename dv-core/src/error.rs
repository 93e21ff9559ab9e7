//! Error types, shared with the rest of the workspace through dv-error

pub use dv_error::{DvfsError, Result};
