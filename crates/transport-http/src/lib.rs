// HTTP transport for network-backed samples

pub mod client;
pub mod range_source;

pub use client::{create_http_agent, is_http_url, probe_content_length};
pub use range_source::HttpRangeSource;
