//! Caller-supplied content equality.

use std::io;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::stream::{streams_equal, ByteStream};

/// Decides whether two content streams are equivalent.
///
/// Implementations consume as much of each stream as they need; callers
/// must not reuse the streams afterwards.
#[async_trait]
pub trait ContentEquality: Send + Sync {
    async fn equivalent(&self, left: ByteStream<'_>, right: ByteStream<'_>) -> io::Result<bool>;
}

/// Byte-for-byte equality in fixed-size chunks.
#[derive(Clone, Copy, Debug)]
pub struct OrdinalStreamEquality {
    pub chunk_size: usize,
}

impl OrdinalStreamEquality {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Default for OrdinalStreamEquality {
    fn default() -> Self {
        Self::new(8192)
    }
}

#[async_trait]
impl ContentEquality for OrdinalStreamEquality {
    async fn equivalent(&self, left: ByteStream<'_>, right: ByteStream<'_>) -> io::Result<bool> {
        streams_equal(left, right, self.chunk_size).await
    }
}

/// Structural JSON equality.
///
/// Both sides are parsed as JSON and compared as values, so whitespace and
/// object key order do not matter. If either side is not valid JSON the raw
/// bytes are compared instead. Both streams are buffered in full.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEquality;

#[async_trait]
impl ContentEquality for JsonEquality {
    async fn equivalent(&self, left: ByteStream<'_>, right: ByteStream<'_>) -> io::Result<bool> {
        let mut left_bytes = Vec::new();
        left.read_to_end(&mut left_bytes).await?;
        let mut right_bytes = Vec::new();
        right.read_to_end(&mut right_bytes).await?;

        match (
            serde_json::from_slice::<serde_json::Value>(&left_bytes),
            serde_json::from_slice::<serde_json::Value>(&right_bytes),
        ) {
            (Ok(l), Ok(r)) => Ok(l == r),
            _ => {
                debug!("content is not JSON; comparing bytes");
                Ok(left_bytes == right_bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn check(eq: &dyn ContentEquality, a: &str, b: &str) -> bool {
        let mut left = Cursor::new(a.as_bytes().to_vec());
        let mut right = Cursor::new(b.as_bytes().to_vec());
        eq.equivalent(&mut left, &mut right).await.unwrap()
    }

    #[tokio::test]
    async fn ordinal_is_byte_exact() {
        let eq = OrdinalStreamEquality::default();
        assert!(check(&eq, "[1, 2]", "[1, 2]").await);
        assert!(!check(&eq, "[1, 2]", "[1,2]").await);
    }

    #[tokio::test]
    async fn json_ignores_formatting_and_key_order() {
        assert!(check(&JsonEquality, "[1, 2]", "[1,2]").await);
        assert!(check(&JsonEquality, r#"{"a":1,"b":[true]}"#, "{ \"b\": [true],\n \"a\": 1 }").await);
        assert!(!check(&JsonEquality, "[1, 2]", "[2, 1]").await);
    }

    #[tokio::test]
    async fn json_falls_back_to_bytes() {
        assert!(check(&JsonEquality, "not json", "not json").await);
        assert!(!check(&JsonEquality, "not json", "not  json").await);
        assert!(!check(&JsonEquality, "[1]", "[1").await);
    }
}
