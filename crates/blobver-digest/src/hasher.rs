use std::fmt;
use std::io;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size used when digesting or comparing streams.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// MD5 digest of an object's full content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentDigest([u8; 16]);

impl ContentDigest {
    /// Digest a complete in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        let mut digest = IncrementalDigest::new();
        digest.update(data);
        digest.finalize()
    }

    /// The raw 16 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lower-case hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(s).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        let raw: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.to_hex()
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Running MD5 over content that arrives in chunks.
#[derive(Clone, Default)]
pub struct IncrementalDigest {
    inner: Md5,
    len: u64,
}

impl IncrementalDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> ContentDigest {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.inner.finalize());
        ContentDigest(raw)
    }
}

/// Digest everything `reader` yields, `chunk_size` bytes at a time.
pub async fn digest_reader<R>(reader: &mut R, chunk_size: usize) -> io::Result<ContentDigest>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut digest = IncrementalDigest::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(digest.finalize());
        }
        digest.update(&buf[..n]);
    }
}

/// Errors from digest parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected 16 bytes, got {0}")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_md5_vectors() {
        assert_eq!(ContentDigest::of(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            ContentDigest::of(b"foobar").to_hex(),
            "3858f62230ac3c915f300c664312c63f"
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut digest = IncrementalDigest::new();
        digest.update(b"foo");
        digest.update(b"bar");
        assert_eq!(digest.len(), 6);
        assert_eq!(digest.finalize(), ContentDigest::of(b"foobar"));
    }

    #[test]
    fn hex_parse_rejects_bad_input() {
        assert!(matches!(
            ContentDigest::from_hex("zz"),
            Err(DigestError::InvalidHex(_))
        ));
        assert_eq!(
            ContentDigest::from_hex("abcd"),
            Err(DigestError::InvalidLength(2))
        );
        let d = ContentDigest::of(b"x");
        assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
    }

    #[test]
    fn serializes_as_hex() {
        let d = ContentDigest::of(b"foobar");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"3858f62230ac3c915f300c664312c63f\"");
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[tokio::test]
    async fn reader_digest_is_chunk_size_independent() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let expected = ContentDigest::of(&data);
        for chunk in [1, 7, 4096, DEFAULT_CHUNK_SIZE, 1 << 20] {
            let mut reader = std::io::Cursor::new(data.clone());
            assert_eq!(digest_reader(&mut reader, chunk).await.unwrap(), expected);
        }
    }
}
