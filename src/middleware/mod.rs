mod client_ip;
mod cors;
mod trace_id;

pub use client_ip::client_ip;
pub use cors::cors_middleware;
pub use trace_id::{TRACE_ID_HEADER, TraceId, trace_id_middleware};
