//! Embedding pipeline
//!
//! Lazy text→vector transform over fastembed. The model loads on first use;
//! a load failure is remembered and short-circuits every later call until
//! the process restarts or the pipeline is reconfigured with a different
//! model. Output vectors are L2-normalized and validated against the
//! configured dimension.

use std::path::PathBuf;
use std::sync::Mutex;

#[cfg(feature = "embeddings")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::decision::Decision;
#[cfg(feature = "embeddings")]
use crate::embeddings::l2_normalize;
use crate::error::MemoryError;

/// Maximum text length in bytes fed to the model (longer input truncated)
const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size for multi-text embedding
#[cfg(feature = "embeddings")]
const BATCH_SIZE: usize = 32;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum EmbeddingError {
    /// Model failed to load; remembered across calls
    ModelInit(String),
    /// Inference failed for this call
    Inference(String),
    /// Empty or whitespace-only input
    InvalidInput(String),
    /// Output width differs from the configured dimension (expected, got)
    DimensionMismatch(usize, usize),
    /// Embeddings are switched off (Tier 3 or feature disabled)
    Disabled,
}

impl std::fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::ModelInit(e) => write!(f, "Model initialization failed: {}", e),
            EmbeddingError::Inference(e) => write!(f, "Embedding generation failed: {}", e),
            EmbeddingError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            EmbeddingError::DimensionMismatch(expected, got) => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, got)
            }
            EmbeddingError::Disabled => write!(f, "Embeddings are disabled"),
        }
    }
}

impl std::error::Error for EmbeddingError {}

impl From<EmbeddingError> for MemoryError {
    fn from(e: EmbeddingError) -> Self {
        MemoryError::Embedding(e.to_string())
    }
}

// ============================================================================
// MODEL RESOLUTION
// ============================================================================

/// Map a configured model name onto a fastembed model.
///
/// Unknown names warn and fall back to the default multilingual model.
#[cfg(feature = "embeddings")]
fn resolve_model(name: &str) -> EmbeddingModel {
    match name {
        "Xenova/multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            EmbeddingModel::MultilingualE5Small
        }
        "sentence-transformers/all-MiniLM-L6-v2" | "Xenova/all-MiniLM-L6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        other => {
            tracing::warn!(
                "Unknown embedding model {:?}, falling back to multilingual-e5-small",
                other
            );
            EmbeddingModel::MultilingualE5Small
        }
    }
}

/// Truncate at a char boundary at or below `max` bytes.
fn truncate_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// PIPELINE
// ============================================================================

struct PipelineState {
    model_name: String,
    dimensions: usize,
    cache_dir: PathBuf,
    #[cfg(feature = "embeddings")]
    model: Option<TextEmbedding>,
    /// Remembered load failure; cleared only by reconfiguration
    failure: Option<String>,
}

/// Long-lived text→vector transform
pub struct EmbeddingPipeline {
    state: Mutex<PipelineState>,
    /// Tier 3: never touch the model
    disabled: bool,
}

impl EmbeddingPipeline {
    /// Create a pipeline. Nothing loads until the first `embed` call.
    pub fn new(
        model_name: impl Into<String>,
        dimensions: usize,
        cache_dir: PathBuf,
        disabled: bool,
    ) -> Self {
        Self {
            state: Mutex::new(PipelineState {
                model_name: model_name.into(),
                dimensions,
                cache_dir,
                #[cfg(feature = "embeddings")]
                model: None,
                failure: None,
            }),
            disabled,
        }
    }

    /// Whether this pipeline will ever produce vectors.
    pub fn is_disabled(&self) -> bool {
        if self.disabled {
            return true;
        }
        cfg!(not(feature = "embeddings"))
    }

    /// Whether a previous model load failed permanently.
    pub fn is_poisoned(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failure
            .is_some()
    }

    /// Configured output dimension.
    pub fn dimensions(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .dimensions
    }

    /// Configured model name.
    pub fn model_name(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .model_name
            .clone()
    }

    /// Apply new model settings. Returns true when they differ from the
    /// current ones, in which case the loaded handle and any remembered
    /// failure are discarded (the caller must clear the embedding cache).
    pub fn reconfigure(
        &self,
        model_name: &str,
        dimensions: usize,
        cache_dir: PathBuf,
    ) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.model_name == model_name && state.dimensions == dimensions {
            return false;
        }
        tracing::info!(
            "Embedding model changed: {} ({}d) -> {} ({}d)",
            state.model_name,
            state.dimensions,
            model_name,
            dimensions
        );
        state.model_name = model_name.to_string();
        state.dimensions = dimensions;
        state.cache_dir = cache_dir;
        state.failure = None;
        #[cfg(feature = "embeddings")]
        {
            state.model = None;
        }
        true
    }

    /// Embed one text. Rejects blank input; validates the output width.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "text must not be empty or whitespace-only".to_string(),
            ));
        }
        if self.disabled {
            return Err(EmbeddingError::Disabled);
        }

        #[cfg(not(feature = "embeddings"))]
        {
            Err(EmbeddingError::Disabled)
        }

        #[cfg(feature = "embeddings")]
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            Self::ensure_model(&mut state)?;
            let expected = state.dimensions;
            let model = state
                .model
                .as_mut()
                .ok_or_else(|| EmbeddingError::ModelInit("model handle missing".to_string()))?;

            let input = truncate_text(text, MAX_TEXT_LENGTH);
            let mut vectors = model
                .embed(vec![input], None)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let mut vector = vectors
                .pop()
                .ok_or_else(|| EmbeddingError::Inference("no embedding produced".to_string()))?;

            if vector.len() != expected {
                return Err(EmbeddingError::DimensionMismatch(expected, vector.len()));
            }
            l2_normalize(&mut vector);
            Ok(vector)
        }
    }

    /// Embed many texts in one forward pass per batch, preserving order.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if let Some(blank) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "text at index {blank} is empty or whitespace-only"
            )));
        }
        if self.disabled {
            return Err(EmbeddingError::Disabled);
        }

        #[cfg(not(feature = "embeddings"))]
        {
            Err(EmbeddingError::Disabled)
        }

        #[cfg(feature = "embeddings")]
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            Self::ensure_model(&mut state)?;
            let expected = state.dimensions;
            let model = state
                .model
                .as_mut()
                .ok_or_else(|| EmbeddingError::ModelInit("model handle missing".to_string()))?;

            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(BATCH_SIZE) {
                let truncated: Vec<&str> = chunk
                    .iter()
                    .map(|t| truncate_text(t, MAX_TEXT_LENGTH))
                    .collect();
                let vectors = model
                    .embed(truncated, None)
                    .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
                for mut vector in vectors {
                    if vector.len() != expected {
                        return Err(EmbeddingError::DimensionMismatch(expected, vector.len()));
                    }
                    l2_normalize(&mut vector);
                    out.push(vector);
                }
            }
            if out.len() != texts.len() {
                return Err(EmbeddingError::Inference(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    out.len()
                )));
            }
            Ok(out)
        }
    }

    /// Embed the canonical enriched view of a decision.
    pub fn embed_enriched(&self, decision: &Decision) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&decision.enriched_text())
    }

    #[cfg(feature = "embeddings")]
    fn ensure_model(state: &mut PipelineState) -> Result<(), EmbeddingError> {
        if state.model.is_some() {
            return Ok(());
        }
        if let Some(failure) = &state.failure {
            return Err(EmbeddingError::ModelInit(failure.clone()));
        }

        if let Err(e) = std::fs::create_dir_all(&state.cache_dir) {
            tracing::warn!(
                "Failed to create model cache directory {:?}: {}",
                state.cache_dir,
                e
            );
        }

        let options = InitOptions::new(resolve_model(&state.model_name))
            .with_show_download_progress(false)
            .with_cache_dir(state.cache_dir.clone());

        match TextEmbedding::try_new(options) {
            Ok(model) => {
                tracing::info!("Embedding model {} loaded", state.model_name);
                state.model = Some(model);
                Ok(())
            }
            Err(e) => {
                let message = format!(
                    "Failed to initialize embedding model {}: {}",
                    state.model_name, e
                );
                tracing::warn!("{}", message);
                state.failure = Some(message.clone());
                Err(EmbeddingError::ModelInit(message))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
