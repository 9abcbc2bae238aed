//! Chunked encoder contract and in-memory implementation
//!
//! A chunked encoder incrementally encodes the live composite into
//! sequential buffers and assembles them into one blob on finalize. The
//! encoder is armed with the [`RenderPlan`] for the composite; it never
//! receives raw per-source tracks to merge on its own.

use crate::error::{StudioError, StudioResult};
use crate::layout::RenderPlan;
use crate::recorder::state::BlobHandle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One encoded buffer of the live composite
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Monotonic sequence number, starting at 0
    pub seq: u64,
    pub data: Vec<u8>,
    /// Milliseconds of recorded time at which this chunk was cut
    pub timestamp_ms: u64,
}

/// Incremental encoder over the composite of active source tracks.
///
/// Implementations deliver chunks on the sender passed to `start` at their
/// own cadence. `pause` and `resume` toggle production without destroying
/// encoder state; `finalize` stops production, drops the chunk sender so
/// the channel closes, and assembles every chunk into one blob.
#[async_trait]
pub trait ChunkedEncoder: Send {
    fn mime_type(&self) -> &str;

    async fn start(
        &mut self,
        plan: RenderPlan,
        chunks: mpsc::Sender<EncodedChunk>,
    ) -> StudioResult<()>;

    async fn pause(&mut self) -> StudioResult<()>;

    async fn resume(&mut self) -> StudioResult<()>;

    async fn finalize(&mut self) -> StudioResult<BlobHandle>;
}

/// Creates encoders for a session. Initialization failures (for example an
/// unsupported codec) surface here, before any session state changes.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, mime_type: &str) -> StudioResult<Box<dyn ChunkedEncoder>>;
}

#[derive(Default)]
struct EncoderShared {
    paused: AtomicBool,
    next_seq: AtomicU64,
    bytes: AtomicU64,
    chunks: AtomicU64,
}

/// In-memory [`ChunkedEncoder`] producing placeholder chunks on a timer.
///
/// Realizes the control-plane contract without a real media pipeline:
/// chunk cadence, pause/resume, and finalize behave like the real thing
/// while the payload is synthetic.
pub struct MemoryEncoder {
    mime_type: String,
    chunk_interval: Duration,
    chunk_len: usize,
    shared: Arc<EncoderShared>,
    ticker: Option<JoinHandle<()>>,
    armed_plan: Option<RenderPlan>,
}

impl MemoryEncoder {
    pub fn new(mime_type: impl Into<String>, chunk_interval: Duration) -> Self {
        Self {
            mime_type: mime_type.into(),
            chunk_interval,
            chunk_len: 4096,
            shared: Arc::new(EncoderShared::default()),
            ticker: None,
            armed_plan: None,
        }
    }

    /// The render plan this encoder was armed with.
    pub fn armed_plan(&self) -> Option<&RenderPlan> {
        self.armed_plan.as_ref()
    }
}

#[async_trait]
impl ChunkedEncoder for MemoryEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn start(
        &mut self,
        plan: RenderPlan,
        chunks: mpsc::Sender<EncodedChunk>,
    ) -> StudioResult<()> {
        self.armed_plan = Some(plan);

        let shared = self.shared.clone();
        let interval = self.chunk_interval;
        let chunk_len = self.chunk_len;
        // The schedule is anchored here, at arm time, so the first chunk
        // lands one interval in no matter when the task is first polled.
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        self.ticker = Some(tokio::spawn(async move {
            let mut elapsed_ms = 0u64;
            loop {
                ticker.tick().await;
                if shared.paused.load(Ordering::SeqCst) {
                    continue;
                }
                // Recorded time, not wall time: paused ticks don't count.
                elapsed_ms += interval.as_millis() as u64;
                let chunk = EncodedChunk {
                    seq: shared.next_seq.fetch_add(1, Ordering::SeqCst),
                    data: vec![0u8; chunk_len],
                    timestamp_ms: elapsed_ms,
                };
                shared.bytes.fetch_add(chunk.data.len() as u64, Ordering::SeqCst);
                shared.chunks.fetch_add(1, Ordering::SeqCst);
                if chunks.send(chunk).await.is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    async fn pause(&mut self) -> StudioResult<()> {
        self.shared.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> StudioResult<()> {
        self.shared.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn finalize(&mut self) -> StudioResult<BlobHandle> {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        Ok(BlobHandle {
            id: Uuid::new_v4(),
            size_bytes: self.shared.bytes.load(Ordering::SeqCst),
            chunk_count: self.shared.chunks.load(Ordering::SeqCst),
        })
    }
}

impl Drop for MemoryEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Factory for [`MemoryEncoder`]s
pub struct MemoryEncoderFactory {
    chunk_interval: Duration,
}

impl MemoryEncoderFactory {
    pub fn new(chunk_interval: Duration) -> Self {
        Self { chunk_interval }
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn create(&self, mime_type: &str) -> StudioResult<Box<dyn ChunkedEncoder>> {
        if !mime_type.starts_with("video/") {
            return Err(StudioError::EncoderInitFailure {
                reason: format!("unsupported mime type: {mime_type}"),
            });
        }
        Ok(Box::new(MemoryEncoder::new(mime_type, self.chunk_interval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RenderPlan;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn chunks_arrive_on_the_configured_cadence() {
        let mut encoder = MemoryEncoder::new("video/webm", Duration::from_millis(100));
        let (tx, mut rx) = mpsc::channel(16);
        encoder.start(RenderPlan::default(), tx).await.unwrap();

        advance(Duration::from_millis(350)).await;
        tokio::task::yield_now().await;
        let blob = encoder.finalize().await.unwrap();

        assert_eq!(blob.chunk_count, 3);
        assert_eq!(blob.size_bytes, 3 * 4096);
        assert_eq!(rx.recv().await.unwrap().seq, 0);
        assert_eq!(rx.recv().await.unwrap().seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_suspends_chunk_production_without_destroying_state() {
        let mut encoder = MemoryEncoder::new("video/webm", Duration::from_millis(100));
        let (tx, mut rx) = mpsc::channel(64);
        encoder.start(RenderPlan::default(), tx).await.unwrap();

        advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        encoder.pause().await.unwrap();
        advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        encoder.resume().await.unwrap();
        advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        let blob = encoder.finalize().await.unwrap();
        assert_eq!(blob.chunk_count, 4);

        // Timestamps count recorded time only; the paused window leaves
        // no gap.
        let mut timestamps = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            timestamps.push(chunk.timestamp_ms);
        }
        assert_eq!(timestamps, vec![100, 200, 300, 400]);
    }

    #[test]
    fn factory_rejects_non_video_mime_types() {
        let factory = MemoryEncoderFactory::new(Duration::from_secs(1));
        assert!(matches!(
            factory.create("application/x-bogus"),
            Err(StudioError::EncoderInitFailure { .. })
        ));
        assert!(factory.create("video/webm").is_ok());
    }
}
