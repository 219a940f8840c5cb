//! Interactive segmentation state machine.
//!
//! A [`SegmentationSession`] drives one image through the workflow: encode it
//! remotely, load the decoder in parallel, then turn every click, undo or
//! clear into a decoder pass.
//!
//! # Ordering
//!
//! Clicks arrive faster than decodes finish. Every operation that starts a
//! decode takes a fresh decode version; when a decode completes, its result
//! is applied only if its version is still the latest. The same rule applies
//! to encodes. A superseded result is dropped and counted in
//! [`STALE_RESULTS_TOTAL`](crate::telemetry::STALE_RESULTS_TOTAL), so the
//! displayed mask always reflects the most recently submitted point list.
//!
//! # Preconditions
//!
//! Point operations before both the embedding and the decoder are ready, or
//! after [`dispose`](SegmentationSession::dispose), do nothing and return
//! `None`. They are logged at debug level and never reported as errors.

mod events;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

pub use events::{ChannelEvents, NoopEvents, SessionError, SessionEvent, SessionEvents};

use crate::decoder::MaskDecoder;
use crate::encoder::EmbeddingEncoder;
use crate::error::ErrorKind;
use crate::telemetry;
use crate::types::{Embedding, ImageSize, MaskOutput, PointPrompt, Status};

#[derive(Default)]
struct SessionState {
    encoder_status: Status,
    decoder_status: Status,
    embedding: Option<Arc<Embedding>>,
    points: Vec<PointPrompt>,
    /// Point lists as they were before each add/undo, most recent last.
    undo_stack: Vec<Vec<PointPrompt>>,
    current: Option<MaskOutput>,
    in_flight: usize,
    encode_version: u64,
    decode_version: u64,
    disposed: bool,
}

impl SessionState {
    /// The embedding to decode against, if point operations are allowed.
    fn ready_embedding(&self) -> Option<Arc<Embedding>> {
        if self.disposed || !self.decoder_status.is_ready() {
            return None;
        }
        self.embedding.clone()
    }

    /// Claim a new decode version and mark a decode as running.
    fn begin_decode(&mut self) -> u64 {
        self.decode_version += 1;
        self.in_flight += 1;
        self.decode_version
    }
}

struct Inner {
    encoder: Arc<dyn EmbeddingEncoder>,
    decoder: Arc<dyn MaskDecoder>,
    events: Arc<dyn SessionEvents>,
    state: Mutex<SessionState>,
}

/// One image's click-to-select session.
///
/// Cloning gives another handle to the same session.
#[derive(Clone)]
pub struct SegmentationSession {
    inner: Arc<Inner>,
}

impl SegmentationSession {
    /// Session without event callbacks.
    pub fn new(encoder: Arc<dyn EmbeddingEncoder>, decoder: Arc<dyn MaskDecoder>) -> Self {
        Self::with_events(encoder, decoder, Arc::new(NoopEvents))
    }

    pub fn with_events(
        encoder: Arc<dyn EmbeddingEncoder>,
        decoder: Arc<dyn MaskDecoder>,
        events: Arc<dyn SessionEvents>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                encoder,
                decoder,
                events,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit a new source image.
    ///
    /// Drops everything derived from the previous image, starts loading the
    /// decoder if it has never been started, and waits for the encoder.
    /// Failures are reported through [`SessionEvents::on_error`] and leave
    /// the encoder in [`Status::Error`].
    pub async fn encode_image(&self, image: Vec<u8>) {
        let (version, start_decoder) = {
            let mut st = self.lock();
            if st.disposed {
                debug!("encode_image ignored: session disposed");
                return;
            }
            st.encode_version += 1;
            st.decode_version += 1;
            st.embedding = None;
            st.points.clear();
            st.undo_stack.clear();
            st.current = None;
            st.encoder_status = Status::Loading;

            let start_decoder = st.decoder_status == Status::Idle;
            if start_decoder {
                st.decoder_status = Status::Loading;
            }
            (st.encode_version, start_decoder)
        };

        if start_decoder {
            let session = self.clone();
            tokio::spawn(async move { session.finish_decoder_init().await });
        }

        let encoder = &self.inner.encoder;
        debug!(encoder = encoder.name(), version, bytes = image.len(), "encoding image");
        let start = Instant::now();
        let result = encoder.encode(image).await;
        Self::record_encode(encoder.name(), start, result.is_ok());

        let applied = {
            let mut st = self.lock();
            if st.disposed || st.encode_version != version {
                None
            } else {
                match result {
                    Ok(embedding) => {
                        st.embedding = Some(Arc::new(embedding));
                        st.encoder_status = Status::Ready;
                        Some(Ok(()))
                    }
                    Err(e) => {
                        st.encoder_status = Status::Error;
                        Some(Err(e))
                    }
                }
            }
        };

        match applied {
            None => {
                debug!(version, "discarding superseded encode result");
                Self::record_stale("encode");
            }
            Some(Ok(())) => {
                info!(version, "embedding ready");
                self.inner.events.on_encoder_ready();
            }
            Some(Err(e)) => {
                warn!(error = %e, "image encoding failed");
                self.inner
                    .events
                    .on_error(&SessionError::new(ErrorKind::Encode, e.to_string()));
            }
        }
    }

    async fn finish_decoder_init(&self) {
        let decoder = &self.inner.decoder;
        debug!(decoder = decoder.name(), "initializing decoder");
        let result = decoder.initialize().await;

        {
            let mut st = self.lock();
            if st.disposed {
                debug!("decoder initialized after dispose, ignoring");
                return;
            }
            st.decoder_status = if result.is_ok() {
                Status::Ready
            } else {
                Status::Error
            };
        }

        match result {
            Ok(()) => {
                info!(decoder = decoder.name(), "decoder ready");
                self.inner.events.on_decoder_ready();
            }
            Err(e) => {
                warn!(error = %e, "decoder failed to load");
                self.inner
                    .events
                    .on_error(&SessionError::new(ErrorKind::ModelLoad, e.to_string()));
            }
        }
    }

    /// Add a click and decode the extended point list.
    ///
    /// Returns the new mask if this decode was still the latest when it
    /// finished.
    pub async fn add_point(&self, point: PointPrompt, width: u32, height: u32) -> Option<MaskOutput> {
        let (version, embedding, points) = {
            let mut st = self.lock();
            let Some(embedding) = st.ready_embedding() else {
                debug!("add_point ignored: session not ready");
                return None;
            };
            let snapshot = st.points.clone();
            st.undo_stack.push(snapshot);
            st.points.push(point);
            (st.begin_decode(), embedding, st.points.clone())
        };

        self.run_decode(version, embedding, points, width, height).await
    }

    /// Restore the point list from before the last add and re-decode.
    ///
    /// Undoing back to an empty list shows the automatic mask again.
    pub async fn undo_point(&self, width: u32, height: u32) -> Option<MaskOutput> {
        let (version, embedding, points) = {
            let mut st = self.lock();
            let Some(embedding) = st.ready_embedding() else {
                debug!("undo_point ignored: session not ready");
                return None;
            };
            let Some(previous) = st.undo_stack.pop() else {
                debug!("undo_point ignored: nothing to undo");
                return None;
            };
            st.points = previous;
            (st.begin_decode(), embedding, st.points.clone())
        };

        self.run_decode(version, embedding, points, width, height).await
    }

    /// Drop all points and undo history, then show the automatic mask.
    pub async fn clear_points(&self, width: u32, height: u32) -> Option<MaskOutput> {
        let (version, embedding) = {
            let mut st = self.lock();
            if st.disposed {
                debug!("clear_points ignored: session disposed");
                return None;
            }
            st.points.clear();
            st.undo_stack.clear();
            let Some(embedding) = st.ready_embedding() else {
                debug!("clear_points: session not ready, skipping decode");
                return None;
            };
            (st.begin_decode(), embedding)
        };

        self.run_decode(version, embedding, Vec::new(), width, height).await
    }

    /// Segment the most salient object without prompts.
    ///
    /// Points and undo history are left alone, but any decode already
    /// running is superseded.
    pub async fn auto_segment(&self, width: u32, height: u32) -> Option<MaskOutput> {
        let (version, embedding) = {
            let mut st = self.lock();
            let Some(embedding) = st.ready_embedding() else {
                debug!("auto_segment ignored: session not ready");
                return None;
            };
            (st.begin_decode(), embedding)
        };

        self.run_decode(version, embedding, Vec::new(), width, height).await
    }

    /// Release the embedding, the interaction state and the decoder model.
    ///
    /// Work still in flight completes but its results are dropped and no
    /// further callbacks fire. Calling this twice is harmless.
    pub fn dispose(&self) {
        {
            let mut st = self.lock();
            if st.disposed {
                return;
            }
            st.disposed = true;
            st.embedding = None;
            st.points.clear();
            st.undo_stack.clear();
            st.current = None;
            st.encode_version += 1;
            st.decode_version += 1;
            st.encoder_status = Status::Idle;
            st.decoder_status = Status::Idle;
        }
        self.inner.decoder.dispose();
        info!("segmentation session disposed");
    }

    /// Run one decode and apply its result if `version` is still current.
    async fn run_decode(
        &self,
        version: u64,
        embedding: Arc<Embedding>,
        points: Vec<PointPrompt>,
        width: u32,
        height: u32,
    ) -> Option<MaskOutput> {
        let decoder = &self.inner.decoder;
        let mode = if points.is_empty() { "auto" } else { "points" };
        debug!(version, points = points.len(), width, height, mode, "decoding mask");

        let start = Instant::now();
        let result = if points.is_empty() {
            decoder.auto_segment(embedding, width, height).await
        } else {
            decoder.predict(embedding, &points, width, height).await
        };
        Self::record_decode(decoder.name(), mode, start, result.is_ok());

        let applied = {
            let mut st = self.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            if st.disposed || st.decode_version != version {
                None
            } else {
                if let Ok(mask) = &result {
                    st.current = Some(mask.clone());
                }
                Some(result)
            }
        };

        match applied {
            None => {
                debug!(version, "discarding superseded decode result");
                Self::record_stale("decode");
                None
            }
            Some(Ok(mask)) => {
                self.inner.events.on_mask_updated(&mask);
                Some(mask)
            }
            Some(Err(e)) => {
                warn!(error = %e, version, "decode failed");
                self.inner
                    .events
                    .on_error(&SessionError::new(ErrorKind::Inference, e.to_string()));
                None
            }
        }
    }

    pub fn encoder_status(&self) -> Status {
        self.lock().encoder_status
    }

    pub fn decoder_status(&self) -> Status {
        self.lock().decoder_status
    }

    /// Current point list, oldest first.
    pub fn points(&self) -> Vec<PointPrompt> {
        self.lock().points.clone()
    }

    pub fn undo_depth(&self) -> usize {
        self.lock().undo_stack.len()
    }

    /// The mask from the most recent applied decode.
    pub fn current_mask(&self) -> Option<MaskOutput> {
        self.lock().current.clone()
    }

    /// Whether any decode is still running.
    pub fn is_processing(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn embedding_shape(&self) -> Option<Vec<usize>> {
        self.lock().embedding.as_ref().map(|e| e.shape().to_vec())
    }

    /// Image size the server declared for the current embedding.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.lock().embedding.as_ref().map(|e| e.image_size())
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    fn record_encode(encoder: &str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::ENCODE_REQUESTS_TOTAL,
            "encoder" => encoder.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::ENCODE_DURATION_SECONDS,
            "encoder" => encoder.to_owned(),
        )
        .record(start.elapsed().as_secs_f64());
    }

    fn record_decode(decoder: &str, mode: &'static str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::DECODE_REQUESTS_TOTAL,
            "decoder" => decoder.to_owned(),
            "mode" => mode,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::DECODE_DURATION_SECONDS,
            "decoder" => decoder.to_owned(),
            "mode" => mode,
        )
        .record(start.elapsed().as_secs_f64());
    }

    fn record_stale(stage: &'static str) {
        metrics::counter!(telemetry::STALE_RESULTS_TOTAL, "stage" => stage).increment(1);
    }
}
