//! Prompt decoding via ONNX Runtime.
//!
//! Expects a SAM-family decoder export with the standard input names
//! (`image_embeddings`, `point_coords`, `point_labels`, `mask_input`,
//! `has_mask_input`, `orig_im_size`).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use tracing::{debug, info};

use super::tensors::{
    LOW_RES_MASK_SIZE, MODEL_INPUT_SIZE, PromptTensors, mask_from_logits, prompt_tensors,
    select_best_mask,
};
use super::{DecoderConfig, Device, MaskDecoder, check_target};
use crate::types::{Embedding, MaskOutput, PointPrompt};
use crate::{ClickmaskError, Result};

enum LoadState {
    Unloaded,
    Loading,
    Ready(Arc<Mutex<Session>>),
}

/// Local mask decoder backed by an ONNX Runtime session.
///
/// The session is created on first [`initialize`](MaskDecoder::initialize)
/// and inference runs on the blocking thread pool, one call at a time.
pub struct OnnxDecoder {
    config: DecoderConfig,
    state: Mutex<LoadState>,
    /// Bumped by `dispose` so a load that finishes afterwards is dropped.
    generation: AtomicU64,
    /// Wakes callers waiting on a load started by another caller.
    load_finished: Notify,
}

impl OnnxDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LoadState::Unloaded),
            generation: AtomicU64::new(0),
            load_finished: Notify::new(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<Arc<Mutex<Session>>> {
        match &*self.state() {
            LoadState::Ready(session) => Ok(Arc::clone(session)),
            _ => Err(ClickmaskError::DecoderNotReady),
        }
    }

    async fn load(&self) -> Result<Session> {
        let path = self
            .config
            .source
            .resolve(&self.config.cache_dir)
            .await
            .map_err(|e| match e {
                ClickmaskError::ModelLoad(_) => e,
                other => ClickmaskError::ModelLoad(other.to_string()),
            })?;

        let device = self.config.device;
        let threads = self.config.intra_threads;
        tokio::task::spawn_blocking(move || build_session(&path, &device, threads))
            .await
            .map_err(|e| ClickmaskError::ModelLoad(format!("model load task failed: {e}")))?
    }
}

#[async_trait]
impl MaskDecoder for OnnxDecoder {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn initialize(&self) -> Result<()> {
        let mut waited = false;
        let generation = loop {
            // Registered before the state check so a wake-up in between is not lost.
            let finished = self.load_finished.notified();
            {
                let mut state = self.state();
                match *state {
                    LoadState::Ready(_) => return Ok(()),
                    LoadState::Unloaded if waited => {
                        return Err(ClickmaskError::ModelLoad(
                            "decoder load did not complete".to_string(),
                        ));
                    }
                    LoadState::Unloaded => {
                        *state = LoadState::Loading;
                        break self.generation.load(Ordering::SeqCst);
                    }
                    LoadState::Loading => {}
                }
            }
            debug!("decoder load already running, waiting");
            finished.await;
            waited = true;
        };

        info!(
            source = %self.config.source.display_name(),
            device = self.config.device.name(),
            "loading decoder model"
        );
        let loaded = self.load().await;

        let result = {
            let mut state = self.state();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("decoder disposed while loading, dropping session");
                Err(ClickmaskError::ModelLoad(
                    "decoder disposed while loading".to_string(),
                ))
            } else {
                match loaded {
                    Ok(session) => {
                        *state = LoadState::Ready(Arc::new(Mutex::new(session)));
                        info!("decoder model ready");
                        Ok(())
                    }
                    Err(e) => {
                        *state = LoadState::Unloaded;
                        Err(e)
                    }
                }
            }
        };
        self.load_finished.notify_waiters();
        result
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state(), LoadState::Ready(_))
    }

    async fn predict(
        &self,
        embedding: Arc<Embedding>,
        points: &[PointPrompt],
        width: u32,
        height: u32,
    ) -> Result<MaskOutput> {
        check_target(width, height)?;
        let session = self.session()?;
        let prompts = prompt_tensors(points);

        tokio::task::spawn_blocking(move || {
            run_decoder(&session, &embedding, &prompts, width, height)
        })
        .await
        .map_err(|e| ClickmaskError::Inference(format!("decoder task failed: {e}")))?
    }

    fn dispose(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if !matches!(*state, LoadState::Unloaded) {
            debug!("releasing decoder session");
        }
        *state = LoadState::Unloaded;
        drop(state);
        self.load_finished.notify_waiters();
    }
}

fn tensor_error(name: &'static str) -> impl Fn(ort::Error) -> ClickmaskError {
    move |e| ClickmaskError::Inference(format!("failed to create {name} tensor: {e}"))
}

/// One synchronous decoder pass.
fn run_decoder(
    session: &Mutex<Session>,
    embedding: &Embedding,
    prompts: &PromptTensors,
    width: u32,
    height: u32,
) -> Result<MaskOutput> {
    let embedding_shape: [usize; 4] = embedding.shape().try_into().map_err(|_| {
        ClickmaskError::Inference(format!(
            "decoder expects a 4-D embedding, got shape {:?}",
            embedding.shape()
        ))
    })?;

    let n = prompts.len;
    let mask_input = vec![0.0f32; LOW_RES_MASK_SIZE * LOW_RES_MASK_SIZE];
    let has_mask_input = [0.0f32];
    let orig_im_size = [MODEL_INPUT_SIZE, MODEL_INPUT_SIZE];

    let embeddings_tensor = TensorRef::from_array_view((embedding_shape, embedding.data()))
        .map_err(tensor_error("image_embeddings"))?;
    let coords_tensor = TensorRef::from_array_view(([1_usize, n, 2], prompts.coords.as_slice()))
        .map_err(tensor_error("point_coords"))?;
    let labels_tensor = TensorRef::from_array_view(([1_usize, n], prompts.labels.as_slice()))
        .map_err(tensor_error("point_labels"))?;
    let mask_tensor = TensorRef::from_array_view((
        [1_usize, 1, LOW_RES_MASK_SIZE, LOW_RES_MASK_SIZE],
        mask_input.as_slice(),
    ))
    .map_err(tensor_error("mask_input"))?;
    let has_mask_tensor = TensorRef::from_array_view(([1_usize], &has_mask_input[..]))
        .map_err(tensor_error("has_mask_input"))?;
    let size_tensor = TensorRef::from_array_view(([2_usize], &orig_im_size[..]))
        .map_err(tensor_error("orig_im_size"))?;

    let mut session = session
        .lock()
        .map_err(|e| ClickmaskError::Inference(format!("decoder session lock poisoned: {e}")))?;

    let outputs = session
        .run(ort::inputs![
            "image_embeddings" => embeddings_tensor,
            "point_coords" => coords_tensor,
            "point_labels" => labels_tensor,
            "mask_input" => mask_tensor,
            "has_mask_input" => has_mask_tensor,
            "orig_im_size" => size_tensor,
        ])
        .map_err(|e| ClickmaskError::Inference(format!("ONNX inference failed: {e}")))?;

    let masks = outputs
        .get("masks")
        .or_else(|| outputs.get("low_res_masks"))
        .ok_or_else(|| ClickmaskError::Inference("no mask output found".to_string()))?;
    let (mask_shape, mask_data) = masks
        .try_extract_tensor::<f32>()
        .map_err(|e| ClickmaskError::Inference(format!("failed to extract masks: {e}")))?;
    let dims: Vec<usize> = mask_shape.iter().map(|&d| d.max(0) as usize).collect();

    let scores = match outputs
        .get("iou_predictions")
        .or_else(|| outputs.get("scores"))
    {
        Some(value) => Some(
            value
                .try_extract_tensor::<f32>()
                .map_err(|e| ClickmaskError::Inference(format!("failed to extract scores: {e}")))?
                .1,
        ),
        None => None,
    };

    let (plane, score) = select_best_mask(&dims, mask_data, scores)?;
    debug!(points = n, ?dims, score, "decoder pass complete");

    Ok(MaskOutput::new(
        mask_from_logits(plane, &dims, width, height),
        score,
    ))
}

/// Build an ONNX session with the configured execution provider.
fn build_session(model_path: &Path, device: &Device, intra_threads: Option<usize>) -> Result<Session> {
    let mut builder = Session::builder()
        .map_err(|e| ClickmaskError::ModelLoad(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ClickmaskError::ModelLoad(format!("failed to set optimization level: {e}")))?;

    if let Some(threads) = intra_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| ClickmaskError::ModelLoad(format!("failed to set intra threads: {e}")))?;
    }

    let builder = match device {
        Device::Cpu => builder,
        #[cfg(feature = "cuda")]
        Device::Cuda { device_id } => {
            use ort::execution_providers::CUDAExecutionProvider;
            builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(*device_id as i32)
                    .build()])
                .map_err(|e| ClickmaskError::ModelLoad(format!("failed to configure CUDA: {e}")))?
        }
    };

    builder.commit_from_file(model_path).map_err(|e| {
        ClickmaskError::ModelLoad(format!(
            "failed to load ONNX model {}: {e}",
            model_path.display()
        ))
    })
}
