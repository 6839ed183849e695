//! Byte-exact streaming comparison.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// A borrowed async byte source.
pub type ByteStream<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Compare two streams byte for byte, `chunk_size` bytes at a time.
///
/// Each side is read until its chunk buffer is full or it reaches end of
/// stream, so short reads from either source never cause a false mismatch.
/// Memory use is two chunk buffers regardless of content length.
pub async fn streams_equal<L, R>(left: &mut L, right: &mut R, chunk_size: usize) -> io::Result<bool>
where
    L: AsyncRead + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    let size = chunk_size.max(1);
    let mut left_buf = vec![0u8; size];
    let mut right_buf = vec![0u8; size];
    loop {
        let left_len = fill(left, &mut left_buf).await?;
        let right_len = fill(right, &mut right_buf).await?;
        if left_len != right_len || left_buf[..left_len] != right_buf[..right_len] {
            return Ok(false);
        }
        if left_len < size {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn eq(a: &[u8], b: &[u8], chunk: usize) -> bool {
        streams_equal(&mut Cursor::new(a.to_vec()), &mut Cursor::new(b.to_vec()), chunk)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn equal_and_unequal_content() {
        assert!(eq(b"foobar", b"foobar", 8192).await);
        assert!(!eq(b"foobar", b"foobaz", 8192).await);
        assert!(!eq(b"foo", b"foobar", 8192).await);
        assert!(!eq(b"foobar", b"foo", 8192).await);
    }

    #[tokio::test]
    async fn empty_streams() {
        assert!(eq(b"", b"", 4).await);
        assert!(!eq(b"", b"x", 4).await);
    }

    #[tokio::test]
    async fn content_at_exact_chunk_boundaries() {
        assert!(eq(b"abcdabcd", b"abcdabcd", 4).await);
        assert!(!eq(b"abcdabcd", b"abcdabce", 4).await);
        assert!(!eq(b"abcd", b"abcdabcd", 4).await);
    }

    #[tokio::test]
    async fn short_reads_do_not_cause_mismatch() {
        // A reader that yields one byte per read against a cursor that fills
        // whole chunks.
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 7) as u8).collect();
        let (mut client, mut server) = tokio::io::duplex(1);
        let writer_data = data.clone();
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            server.write_all(&writer_data).await.unwrap();
        });
        let equal = streams_equal(&mut client, &mut Cursor::new(data), 64).await.unwrap();
        writer.await.unwrap();
        assert!(equal);
    }
}
