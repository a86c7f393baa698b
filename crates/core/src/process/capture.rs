//! Output stream collection with a per-buffer byte cap.
//!
//! Readers are drained to EOF unless the stop token fires first. Bytes past
//! the cap are discarded rather than left in the pipe, so a chatty child
//! never blocks on a full pipe while we wait for it to exit.

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

const READ_CHUNK: usize = 8 * 1024;

/// Bytes collected from one buffer.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl Collected {
    fn push(&mut self, chunk: &[u8], cap: usize) {
        let room = cap.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            self.truncated = true;
        }
    }
}

/// Read `reader` to EOF, or until `stop` fires.
pub(crate) async fn drain<R>(
    mut reader: R,
    cap: usize,
    stop: &CancellationToken,
) -> std::io::Result<Collected>
where
    R: AsyncRead + Unpin,
{
    let mut out = Collected::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            biased;
            read = reader.read(&mut chunk) => read?,
            _ = stop.cancelled() => return Ok(out),
        };
        if n == 0 {
            return Ok(out);
        }
        out.push(&chunk[..n], cap);
    }
}

/// Read both readers to EOF into one buffer, in arrival order, or until
/// `stop` fires.
pub(crate) async fn drain_merged<A, B>(
    a: A,
    b: B,
    cap: usize,
    stop: &CancellationToken,
) -> std::io::Result<Collected>
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
{
    let mut out = Collected::default();
    let mut merged = futures::stream::select(ReaderStream::new(a), ReaderStream::new(b));
    loop {
        let next = tokio::select! {
            biased;
            next = merged.next() => next,
            _ = stop.cancelled() => return Ok(out),
        };
        let Some(chunk) = next else {
            return Ok(out);
        };
        out.push(&chunk?, cap);
    }
}

/// Write `data` and close the pipe. A child that exits without reading all
/// of its input is not an error here; its exit status tells the story.
pub(crate) async fn feed<W>(pipe: Option<W>, data: Option<Vec<u8>>, command: &str)
where
    W: AsyncWrite + Unpin,
{
    let (Some(mut pipe), Some(data)) = (pipe, data) else {
        return;
    };
    if let Err(e) = pipe.write_all(&data).await {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            tracing::debug!(command, "Child closed stdin early");
        } else {
            tracing::warn!(command, error = %e, "Failed to write child stdin");
        }
    }
    if let Err(e) = pipe.shutdown().await {
        tracing::debug!(command, error = %e, "Failed to close child stdin");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_respects_cap_but_reads_everything() {
        let data = vec![7u8; 100_000];
        let collected = drain(&data[..], 1000, &CancellationToken::new())
            .await
            .expect("drain");
        assert_eq!(collected.bytes.len(), 1000);
        assert!(collected.truncated);
    }

    #[tokio::test]
    async fn drain_under_cap_is_complete() {
        let collected = drain(&b"hello"[..], 1000, &CancellationToken::new())
            .await
            .expect("drain");
        assert_eq!(collected.bytes, b"hello");
        assert!(!collected.truncated);
    }

    #[tokio::test]
    async fn merged_drain_keeps_all_bytes() {
        let collected = drain_merged(&b"out"[..], &b"err"[..], 1000, &CancellationToken::new())
            .await
            .expect("drain");
        assert_eq!(collected.bytes.len(), 6);
        let text = String::from_utf8(collected.bytes).expect("utf8");
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }

    #[tokio::test]
    async fn stop_returns_what_was_read_from_an_open_pipe() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"partial").await.expect("write");
        let stop = CancellationToken::new();
        let stopper = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stopper.cancel();
        });

        // `writer` stays open, so only the stop token can end the read.
        let collected = drain(reader, 1000, &stop).await.expect("drain");
        assert_eq!(collected.bytes, b"partial");
        assert!(!collected.truncated);
        drop(writer);
    }

    #[tokio::test]
    async fn stop_ends_a_merged_drain() {
        let (_out_writer, out) = tokio::io::duplex(64);
        let (_err_writer, err) = tokio::io::duplex(64);
        let stop = CancellationToken::new();
        stop.cancel();

        let collected = drain_merged(out, err, 1000, &stop).await.expect("drain");
        assert!(collected.bytes.is_empty());
    }
}
