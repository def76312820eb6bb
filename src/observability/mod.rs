//! Observability module providing structured logging.
//!
//! Installs the `tracing` subscriber with a configurable format
//! (pretty, compact, JSON) and filter directives.

mod tracing_init;

pub use tracing_init::*;
