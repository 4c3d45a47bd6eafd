//! Fixed-size shared-memory segments, a registry, attach/detach bookkeeping,
//! and a ring buffer built on top of a segment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::IpcError;
use crate::process::pid::Pid;

/// A fixed-size byte segment. Reads and writes clamp to bounds and return the
/// count actually transferred; the segment never grows.
pub struct Segment {
    data: Mutex<Vec<u8>>,
    readers: AtomicU32,
    writers: AtomicU32,
}

impl Segment {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(vec![0u8; size]),
            readers: AtomicU32::new(0),
            writers: AtomicU32::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn read(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        if offset >= data.len() {
            return 0;
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    pub fn write(&self, offset: usize, bytes: &[u8]) -> usize {
        let mut data = self.data.lock().unwrap();
        if offset >= data.len() {
            return 0;
        }
        let n = bytes.len().min(data.len() - offset);
        data[offset..offset + n].copy_from_slice(&bytes[..n]);
        n
    }

    pub fn attach_reader(&self) {
        self.readers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn detach_reader(&self) {
        self.readers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn attach_writer(&self) {
        self.writers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn detach_writer(&self) {
        self.writers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn reader_count(&self) -> u32 {
        self.readers.load(Ordering::Relaxed)
    }

    pub fn writer_count(&self) -> u32 {
        self.writers.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Reader,
    Writer,
}

/// Registry of named segments plus per-process attachment tracking; only
/// writers may call `write_as`.
#[derive(Default)]
pub struct SharedMemoryManager {
    segments: Mutex<HashMap<String, Arc<Segment>>>,
    attachments: Mutex<HashMap<(String, Pid), Attachment>>,
}

impl SharedMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str, size: usize) -> Result<Arc<Segment>, IpcError> {
        let mut segments = self.segments.lock().unwrap();
        if segments.contains_key(name) {
            return Err(IpcError::SegmentExists(name.to_string()));
        }
        let segment = Segment::new(size);
        segments.insert(name.to_string(), segment.clone());
        Ok(segment)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Segment>, IpcError> {
        self.segments
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IpcError::SegmentNotFound(name.to_string()))
    }

    pub fn attach(&self, name: &str, pid: Pid, mode: Attachment) -> Result<Arc<Segment>, IpcError> {
        let segment = self.get(name)?;
        let mut attachments = self.attachments.lock().unwrap();
        let key = (name.to_string(), pid);
        if attachments.contains_key(&key) {
            return Err(IpcError::AlreadyAttached);
        }
        match mode {
            Attachment::Reader => segment.attach_reader(),
            Attachment::Writer => segment.attach_writer(),
        }
        attachments.insert(key, mode);
        Ok(segment)
    }

    pub fn detach(&self, name: &str, pid: Pid) -> Result<(), IpcError> {
        let segment = self.get(name)?;
        let mut attachments = self.attachments.lock().unwrap();
        let key = (name.to_string(), pid);
        let mode = attachments.remove(&key).ok_or(IpcError::NotAttached)?;
        match mode {
            Attachment::Reader => segment.detach_reader(),
            Attachment::Writer => segment.detach_writer(),
        }
        Ok(())
    }

    pub fn write_as(&self, name: &str, pid: Pid, offset: usize, bytes: &[u8]) -> Result<usize, IpcError> {
        let attachments = self.attachments.lock().unwrap();
        let key = (name.to_string(), pid);
        match attachments.get(&key) {
            Some(Attachment::Writer) => {}
            Some(Attachment::Reader) => return Err(IpcError::NotAttached),
            None => return Err(IpcError::NotAttached),
        }
        drop(attachments);
        let segment = self.get(name)?;
        Ok(segment.write(offset, bytes))
    }
}

/// Ring buffer over a shared-memory segment. `capacity` is rounded down to
/// the nearest power of two so indices can be masked instead of modded.
pub struct RingBuffer {
    segment: Arc<Segment>,
    mask: usize,
    head: Mutex<usize>,
    tail: Mutex<usize>,
}

fn prev_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1usize << (usize::BITS - 1 - n.leading_zeros())
}

impl RingBuffer {
    pub fn new(size: usize) -> Self {
        let capacity = prev_power_of_two(size.max(1));
        Self {
            segment: Segment::new(capacity),
            mask: capacity - 1,
            head: Mutex::new(0),
            tail: Mutex::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn len(&self) -> usize {
        let head = *self.head.lock().unwrap();
        let tail = *self.tail.lock().unwrap();
        tail.wrapping_sub(head)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), IpcError> {
        // Always take `head` before `tail` (same order as `read`/`len`) to
        // avoid a lock-order inversion between concurrent readers and writers.
        let head = *self.head.lock().unwrap();
        let mut tail = self.tail.lock().unwrap();
        let available = self.capacity() - (*tail).wrapping_sub(head);
        if bytes.len() > available {
            return Err(IpcError::Full);
        }
        for &b in bytes {
            let idx = *tail & self.mask;
            self.segment.write(idx, &[b]);
            *tail = tail.wrapping_add(1);
        }
        Ok(())
    }

    pub fn read(&self, max: usize) -> Vec<u8> {
        let mut head = self.head.lock().unwrap();
        let tail = *self.tail.lock().unwrap();
        let available = tail.wrapping_sub(*head);
        let n = max.min(available);
        let mut out = Vec::with_capacity(n);
        let mut buf = [0u8; 1];
        for _ in 0..n {
            let idx = *head & self.mask;
            self.segment.read(idx, &mut buf);
            out.push(buf[0]);
            *head = head.wrapping_add(1);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_clamp_to_segment_bounds() {
        let segment = Segment::new(4);
        let n = segment.write(2, b"abcd");
        assert_eq!(n, 2); // clamped: only 2 bytes fit from offset 2
        let mut buf = [0u8; 8];
        let read = segment.read(0, &mut buf);
        assert_eq!(read, 4);
        assert_eq!(&buf[..4], &[0, 0, b'a', b'b']);
    }

    #[test]
    fn only_writer_may_write() {
        let mgr = SharedMemoryManager::new();
        mgr.create("seg", 16).unwrap();
        mgr.attach("seg", 1, Attachment::Reader).unwrap();
        assert!(matches!(
            mgr.write_as("seg", 1, 0, b"x"),
            Err(IpcError::NotAttached)
        ));
        mgr.attach("seg", 2, Attachment::Writer).unwrap();
        assert_eq!(mgr.write_as("seg", 2, 0, b"x").unwrap(), 1);
    }

    #[test]
    fn duplicate_attach_is_rejected() {
        let mgr = SharedMemoryManager::new();
        mgr.create("seg", 16).unwrap();
        mgr.attach("seg", 1, Attachment::Reader).unwrap();
        assert!(matches!(
            mgr.attach("seg", 1, Attachment::Reader),
            Err(IpcError::AlreadyAttached)
        ));
    }

    #[test]
    fn ring_buffer_rounds_capacity_to_power_of_two() {
        let rb = RingBuffer::new(10);
        assert_eq!(rb.capacity(), 8);
    }

    #[test]
    fn ring_buffer_write_read_roundtrips_and_fills() {
        let rb = RingBuffer::new(8);
        rb.write(b"abcd").unwrap();
        assert_eq!(rb.read(4), b"abcd");
        rb.write(b"12345678").unwrap();
        assert!(matches!(rb.write(b"x"), Err(IpcError::Full)));
        assert_eq!(rb.read(8), b"12345678");
    }
}
