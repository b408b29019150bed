//! Single-slot access to an encoder that cannot serve concurrent calls.

use tokio::sync::Mutex;
use tracing::trace;

use crate::{Encoder, MultiVector, Result};

/// Wraps an encoder so at most one call runs at a time.
///
/// Callers queue on an async mutex, so tasks waiting for the model yield to
/// the runtime and unrelated store I/O keeps making progress.
pub struct SerializedEncoder<E> {
    inner: E,
    slot: Mutex<()>,
}

impl<E: Encoder> SerializedEncoder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            slot: Mutex::new(()),
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait::async_trait]
impl<E: Encoder> Encoder for SerializedEncoder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn encode(&self, text: &str) -> Result<MultiVector> {
        let _slot = self.slot.lock().await;
        trace!("Encoder slot acquired");
        self.inner.encode(text).await
    }

    async fn encode_query(&self, text: &str) -> Result<MultiVector> {
        let _slot = self.slot.lock().await;
        self.inner.encode_query(text).await
    }

    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<MultiVector>> {
        let _slot = self.slot.lock().await;
        self.inner.encode_batch(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Records the highest number of overlapping calls.
    #[derive(Default)]
    struct PeakEncoder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Encoder for PeakEncoder {
        fn model_id(&self) -> &str {
            "peak-counter"
        }

        fn dimension(&self) -> usize {
            1
        }

        async fn encode(&self, _text: &str) -> Result<MultiVector> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(MultiVector::from_rows(vec![vec![1.0]]).unwrap())
        }
    }

    #[tokio::test]
    async fn test_calls_never_overlap() {
        let encoder = Arc::new(SerializedEncoder::new(PeakEncoder::default()));

        let calls = (0..4).map(|_| {
            let encoder = encoder.clone();
            async move { encoder.encode("x").await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(encoder.inner.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unwrapped_calls_overlap() {
        let encoder = Arc::new(PeakEncoder::default());

        let calls = (0..4).map(|_| {
            let encoder = encoder.clone();
            async move { encoder.encode("x").await }
        });
        futures::future::join_all(calls).await;

        assert!(encoder.peak.load(Ordering::SeqCst) > 1);
    }
}
