//! HTTP binding of the Skatt claim API.

mod http;
mod retry;

pub use http::HttpSkattKlient;
pub use retry::Backoff;
