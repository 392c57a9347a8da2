//! Incremental output aggregation.
//!
//! One reader thread per child pipe. Each thread accumulates its stream
//! into a private buffer, mirrors chunks to this process's own
//! stdout/stderr unless silenced, forwards chunks to a live handle when one
//! exists, and enforces the per-stream output cap.
//!
//! Mirroring writes the raw chunk bytes, so the parent's stream receives
//! exactly what the child wrote even when a multibyte sequence is split
//! across a read boundary. In raw-bytes mode the console rendering is the
//! same as for text capture; only the buffered result differs.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;

use super::result::{OutputChunk, OutputSource};

/// Buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 4096;

/// Destination for mirrored output.
pub(crate) type MirrorSink = Box<dyn Write + Send>;

/// The mirror destination for one stream: the parent's corresponding
/// process stream, or none at all in silent mode.
pub(crate) fn mirror_for(silent: bool, source: OutputSource) -> Option<MirrorSink> {
    if silent {
        return None;
    }
    Some(match source {
        OutputSource::Stdout => Box::new(std::io::stdout()),
        OutputSource::Stderr => Box::new(std::io::stderr()),
    })
}

/// State shared between the two stream readers and the wait loop.
#[derive(Debug)]
pub(crate) struct AggregatorState {
    max_buffer: u64,
    overflow: AtomicBool,
}

impl AggregatorState {
    pub(crate) fn new(max_buffer: u64) -> Self {
        Self {
            max_buffer,
            overflow: AtomicBool::new(false),
        }
    }

    /// Whether either stream has exceeded the output cap.
    pub(crate) fn overflowed(&self) -> bool {
        self.overflow.load(Ordering::Relaxed)
    }

    /// The configured per-stream cap.
    pub(crate) fn max_buffer(&self) -> u64 {
        self.max_buffer
    }

    fn trip(&self) {
        self.overflow.store(true, Ordering::Relaxed);
    }
}

/// Spawn a reader thread consuming one stream until end-of-stream or
/// overflow. Joining the returned handle yields the captured buffer,
/// truncated at the cap when the stream overflowed.
pub(crate) fn spawn_reader<R>(
    mut stream: R,
    source: OutputSource,
    state: Arc<AggregatorState>,
    mut mirror: Option<MirrorSink>,
    chunks: Option<mpsc::Sender<OutputChunk>>,
) -> thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; READ_BUFFER_SIZE];

        loop {
            // Once any stream trips the cap the invocation is done for.
            if state.overflowed() {
                break;
            }

            let n = match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            let data = &chunk[..n];

            // Mirroring and forwarding are independent of buffering.
            if let Some(ref mut sink) = mirror {
                let _ = sink.write_all(data);
                let _ = sink.flush();
            }
            if let Some(ref tx) = chunks {
                let _ = tx.blocking_send(OutputChunk::new(data.to_vec(), source));
            }

            let projected = buffer.len() as u64 + n as u64;
            if projected > state.max_buffer {
                let room = usize::try_from(state.max_buffer.saturating_sub(buffer.len() as u64))
                    .unwrap_or(usize::MAX)
                    .min(n);
                buffer.extend_from_slice(&data[..room]);
                state.trip();
                break;
            }
            buffer.extend_from_slice(data);
        }

        buffer
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// A mirror sink tests can inspect after the reader thread finishes.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn collect(data: &[u8], max_buffer: u64) -> (Vec<u8>, bool) {
        let state = Arc::new(AggregatorState::new(max_buffer));
        let handle = spawn_reader(
            Cursor::new(data.to_vec()),
            OutputSource::Stdout,
            Arc::clone(&state),
            None,
            None,
        );
        let buffer = handle.join().unwrap();
        (buffer, state.overflowed())
    }

    #[test]
    fn test_reader_captures_everything_under_cap() {
        let (buffer, overflowed) = collect(b"hello world\n", 1024);
        assert_eq!(buffer, b"hello world\n");
        assert!(!overflowed);
    }

    #[test]
    fn test_reader_empty_stream() {
        let (buffer, overflowed) = collect(b"", 1024);
        assert!(buffer.is_empty());
        assert!(!overflowed);
    }

    #[test]
    fn test_reader_trips_cap_and_truncates() {
        let data = vec![b'x'; 10_000];
        let (buffer, overflowed) = collect(&data, 100);
        assert!(overflowed);
        assert_eq!(buffer.len(), 100);
    }

    #[test]
    fn test_reader_exact_cap_is_not_overflow() {
        let data = vec![b'x'; 100];
        let (buffer, overflowed) = collect(&data, 100);
        assert!(!overflowed);
        assert_eq!(buffer.len(), 100);
    }

    #[test]
    fn test_overflow_on_one_stream_stops_the_other() {
        let state = Arc::new(AggregatorState::new(1024));
        state.trip();

        // The tripped flag must stop the reader before it buffers anything.
        let handle = spawn_reader(
            Cursor::new(vec![b'y'; 64]),
            OutputSource::Stderr,
            Arc::clone(&state),
            None,
            None,
        );
        let buffer = handle.join().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mirror_for_silent_is_none() {
        assert!(mirror_for(true, OutputSource::Stdout).is_none());
        assert!(mirror_for(true, OutputSource::Stderr).is_none());
        assert!(mirror_for(false, OutputSource::Stdout).is_some());
        assert!(mirror_for(false, OutputSource::Stderr).is_some());
    }

    #[test]
    fn test_mirror_receives_every_byte() {
        let state = Arc::new(AggregatorState::new(u64::MAX));
        let sink = SharedSink::default();

        let handle = spawn_reader(
            Cursor::new(b"mirrored exactly\n".to_vec()),
            OutputSource::Stdout,
            state,
            Some(Box::new(sink.clone())),
            None,
        );
        let buffer = handle.join().unwrap();

        assert_eq!(sink.contents(), b"mirrored exactly\n");
        assert_eq!(buffer, b"mirrored exactly\n");
    }

    #[test]
    fn test_mirror_preserves_multibyte_split_across_reads() {
        // "é" lands with its first byte as the last byte of the first
        // 4096-byte read; a per-chunk lossy decode would mangle it into
        // two replacement characters.
        let mut data = vec![b'a'; READ_BUFFER_SIZE - 1];
        data.extend_from_slice("é rest".as_bytes());

        let state = Arc::new(AggregatorState::new(u64::MAX));
        let sink = SharedSink::default();

        let handle = spawn_reader(
            Cursor::new(data.clone()),
            OutputSource::Stdout,
            state,
            Some(Box::new(sink.clone())),
            None,
        );
        let buffer = handle.join().unwrap();

        assert_eq!(sink.contents(), data);
        assert_eq!(buffer, data);
        assert!(String::from_utf8(sink.contents()).unwrap().contains("é rest"));
    }

    #[test]
    fn test_mirror_still_sees_chunk_that_trips_the_cap() {
        let data = vec![b'z'; 500];
        let state = Arc::new(AggregatorState::new(100));
        let sink = SharedSink::default();

        let handle = spawn_reader(
            Cursor::new(data.clone()),
            OutputSource::Stdout,
            Arc::clone(&state),
            Some(Box::new(sink.clone())),
            None,
        );
        let buffer = handle.join().unwrap();

        assert!(state.overflowed());
        assert_eq!(buffer.len(), 100); // Capture truncated at the cap
        assert_eq!(sink.contents(), data); // Mirroring is not
    }

    #[test]
    fn test_reader_forwards_chunks() {
        let state = Arc::new(AggregatorState::new(1024));
        let (tx, mut rx) = mpsc::channel(16);

        let handle = spawn_reader(
            Cursor::new(b"streamed".to_vec()),
            OutputSource::Stdout,
            state,
            None,
            Some(tx),
        );
        handle.join().unwrap();

        let chunk = rx.blocking_recv().expect("one chunk forwarded");
        assert_eq!(chunk.raw, b"streamed");
        assert_eq!(chunk.source, OutputSource::Stdout);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_reader_dropped_receiver_is_ignored() {
        let state = Arc::new(AggregatorState::new(1024));
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let handle = spawn_reader(
            Cursor::new(b"into the void".to_vec()),
            OutputSource::Stdout,
            state,
            None,
            Some(tx),
        );
        let buffer = handle.join().unwrap();
        assert_eq!(buffer, b"into the void");
    }
}
