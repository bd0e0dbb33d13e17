// HTTP Range-backed media source with a read-ahead window

use crate::client::{create_http_agent, probe_content_length};
use soundpool_core::{AudioError, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Bytes fetched per range request (128KB)
const READ_AHEAD: u64 = 128 * 1024;

/// Contiguous bytes most recently fetched from the server
#[derive(Default)]
struct Window {
    start: u64,
    bytes: Vec<u8>,
}

impl Window {
    fn slice_from(&self, offset: u64) -> Option<&[u8]> {
        let rel = offset.checked_sub(self.start)? as usize;
        self.bytes.get(rel..).filter(|rest| !rest.is_empty())
    }
}

/// Seekable remote sample, fetched window by window as the decoder reads
pub struct HttpRangeSource {
    url: String,
    agent: ureq::Agent,
    len: Option<u64>,
    cursor: u64,
    window: Window,
}

impl HttpRangeSource {
    /// Open a source, probing its size up front
    pub fn open(url: &str) -> Result<Self> {
        let agent = create_http_agent();
        let len = probe_content_length(&agent, url)?;
        log::info!("[http] opened {} (size={:?})", url, len);

        Ok(Self {
            url: url.to_string(),
            agent,
            len,
            cursor: 0,
            window: Window::default(),
        })
    }

    pub fn total_size(&self) -> Option<u64> {
        self.len
    }

    fn fetch(&self, offset: u64) -> Result<Window> {
        let last = match self.len {
            Some(len) => (offset + READ_AHEAD).min(len).saturating_sub(1),
            None => offset + READ_AHEAD - 1,
        };
        log::debug!("[http] GET {} bytes={}-{}", self.url, offset, last);

        let response = self
            .agent
            .get(&self.url)
            .set("Range", &format!("bytes={}-{}", offset, last))
            .call()
            .map_err(|e| AudioError::NetworkError(format!("range request failed: {}", e)))?;
        let partial = response.status() == 206;
        let mut body = response.into_reader();

        if !partial {
            // Full body: discard everything before the requested offset
            io::copy(&mut (&mut body).take(offset), &mut io::sink())
                .map_err(|e| AudioError::NetworkError(format!("skipping body: {}", e)))?;
        }
        let mut bytes = Vec::with_capacity(READ_AHEAD as usize);
        body.take(READ_AHEAD)
            .read_to_end(&mut bytes)
            .map_err(|e| AudioError::NetworkError(format!("reading body: {}", e)))?;

        Ok(Window { start: offset, bytes })
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let exhausted = self.len.map_or(false, |len| self.cursor >= len);
        if buf.is_empty() || exhausted {
            return Ok(0);
        }

        if self.window.slice_from(self.cursor).is_none() {
            self.window = self
                .fetch(self.cursor)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        }
        let Some(available) = self.window.slice_from(self.cursor) else {
            return Ok(0);
        };

        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.cursor += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match (pos, self.len) {
            (SeekFrom::Start(p), _) => Some(p),
            (SeekFrom::Current(delta), _) => self.cursor.checked_add_signed(delta),
            (SeekFrom::End(delta), Some(len)) => len.checked_add_signed(delta),
            (SeekFrom::End(_), None) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "remote size unknown",
                ))
            }
        };

        self.cursor = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        Ok(self.cursor)
    }
}

impl symphonia::core::io::MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        self.len.is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}
