// 16-bit PCM ring buffer between a sample's writer and the output callback

use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed-capacity ring buffer of interleaved i16 samples
pub struct PcmRingBuffer {
    buffer: Vec<i16>,
    write_pos: usize,
    read_pos: usize,
    len: usize,
}

impl PcmRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            write_pos: 0,
            read_pos: 0,
            len: 0,
        }
    }

    /// Append samples; returns how many fit
    pub fn write(&mut self, data: &[i16]) -> usize {
        let to_write = data.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let size = self.buffer.len();
        let first_chunk = to_write.min(size - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + first_chunk].copy_from_slice(&data[..first_chunk]);
        let second_chunk = to_write - first_chunk;
        if second_chunk > 0 {
            self.buffer[..second_chunk].copy_from_slice(&data[first_chunk..to_write]);
        }

        self.write_pos = (self.write_pos + to_write) % size;
        self.len += to_write;
        to_write
    }

    /// Pop up to `output.len()` samples; returns how many were read
    pub fn read(&mut self, output: &mut [i16]) -> usize {
        let to_read = output.len().min(self.len);
        if to_read == 0 {
            return 0;
        }

        let size = self.buffer.len();
        let first_chunk = to_read.min(size - self.read_pos);
        output[..first_chunk].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first_chunk]);
        let second_chunk = to_read - first_chunk;
        if second_chunk > 0 {
            output[first_chunk..to_read].copy_from_slice(&self.buffer[..second_chunk]);
        }

        self.read_pos = (self.read_pos + to_read) % size;
        self.len -= to_read;
        to_read
    }

    pub fn available_write(&self) -> usize {
        self.buffer.len() - self.len
    }

    pub fn available_read(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
        self.len = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

/// Thread-safe wrapper for PcmRingBuffer
#[derive(Clone)]
pub struct SharedPcmRing {
    inner: Arc<Mutex<PcmRingBuffer>>,
}

impl SharedPcmRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PcmRingBuffer::new(capacity))),
        }
    }

    pub fn write(&self, data: &[i16]) -> usize {
        self.inner.lock().write(data)
    }

    pub fn read(&self, output: &mut [i16]) -> usize {
        self.inner.lock().read(output)
    }

    /// Read exactly one frame of `frame.len()` samples, or nothing
    pub fn read_frame(&self, frame: &mut [i16]) -> bool {
        let mut ring = self.inner.lock();
        if ring.available_read() < frame.len() {
            return false;
        }
        ring.read(frame) == frame.len()
    }

    pub fn available_write(&self) -> usize {
        self.inner.lock().available_write()
    }

    pub fn available_read(&self) -> usize {
        self.inner.lock().available_read()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }
}
