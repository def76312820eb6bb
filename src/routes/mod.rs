mod error;
pub mod health;
pub mod proxy;

pub use error::{ProxyError, TracedError};
pub use proxy::edge_handler;
