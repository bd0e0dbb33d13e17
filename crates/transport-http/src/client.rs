// HTTP agent configuration and size probing

use soundpool_core::{AudioError, Result};
use std::time::Duration;

/// Create an agent tuned for short sample downloads
pub fn create_http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .timeout_read(Duration::from_secs(30))
        .user_agent("soundpool/0.1")
        .redirects(10)
        .build()
}

pub fn is_http_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Determine the size of a remote resource.
///
/// Tries `HEAD` first and falls back to a one-byte range request, reading
/// the total from `Content-Range`. `Ok(None)` means the server answered
/// but did not disclose a size.
pub fn probe_content_length(agent: &ureq::Agent, url: &str) -> Result<Option<u64>> {
    match agent.head(url).call() {
        Ok(response) => {
            if let Some(size) = parse_header_u64(response.header("Content-Length")) {
                return Ok(Some(size));
            }
        }
        Err(e) => log::debug!("[http] HEAD {} failed, trying range probe: {}", url, e),
    }

    let response = agent
        .get(url)
        .set("Range", "bytes=0-0")
        .call()
        .map_err(|e| AudioError::NetworkError(format!("size probe failed for {}: {}", url, e)))?;

    if let Some(total) = response.header("Content-Range").and_then(total_from_content_range) {
        return Ok(Some(total));
    }
    if response.status() == 206 {
        // Partial response without a usable total
        return Ok(None);
    }
    Ok(parse_header_u64(response.header("Content-Length")))
}

fn parse_header_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}

/// Parse the total from `bytes 0-0/12345`; `*` yields None
pub(crate) fn total_from_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse::<u64>().ok()
}
