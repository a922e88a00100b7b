//! Process-wide `tracing` setup. Installing a global subscriber can only
//! happen once per process, so this module has no unit tests; the binary
//! exercises it on every run.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
