//! Content hashing compatible with the Build API.
//!
//! The server hashes `"<byte length>|"` followed by the payload with SHA-1
//! and reports the digest as lowercase hex. Local hashes must match exactly
//! so that they can be compared with server-reported ones.

use sha1::{Digest, Sha1};

/// Hash a complete buffer.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new(data.len() as u64);
    hasher.update(data);
    hasher.finish()
}

/// Incremental hasher for content whose length is known up front
/// (e.g. an archive entry being streamed to disk).
#[derive(Clone)]
pub struct ContentHasher {
    inner: Sha1,
}

impl ContentHasher {
    /// Start a hash for `len` bytes of content.
    pub fn new(len: u64) -> Self {
        let mut inner = Sha1::new();
        inner.update(format!("{}|", len).as_bytes());
        Self { inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and return the lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// `Write` adapter that hashes everything passing through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ContentHasher,
    written: u64,
}

impl<W: std::io::Write> HashingWriter<W> {
    pub fn new(inner: W, len: u64) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(len),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Return the wrapped writer and the digest.
    pub fn finish(self) -> (W, String) {
        (self.inner, self.hasher.finish())
    }
}

impl<W: std::io::Write> std::io::Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
