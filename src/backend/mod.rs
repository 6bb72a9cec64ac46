//! Backend module - Upstream data model, HTTP client, and job poller

pub mod http_backend;
pub mod poller;
pub mod traits;
