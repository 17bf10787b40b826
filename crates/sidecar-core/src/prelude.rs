//! Prelude for common imports used throughout all Sidecar crates

pub use crate::error::{Error, Result, ResultExt, StartError};
pub use tracing::{debug, error, info, instrument, trace, warn};
