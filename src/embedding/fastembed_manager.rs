use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// FastEmbed-based embedding provider running models locally
pub struct FastEmbedManager {
    // fastembed's embed() wants &mut self; the provider trait is &self,
    // so the model sits behind a mutex and batches serialize here
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedManager {
    /// Initialize the named model, downloading it on first use
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let model = model_from_name(model_name)?;
        let dimension = dimension_of(&model);

        tracing::info!("Initializing FastEmbed model: {}", model_name);

        let mut options = InitOptions::default();
        options.model_name = model;
        options.show_download_progress = false;

        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            dimension,
            model_name: model_name.to_string(),
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::GenerationFailed(format!("model lock poisoned: {}", e)))?;

        let embeddings = model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

        if let Some(first) = embeddings.first() {
            if first.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: first.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn model_from_name(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(EmbeddingError::InitializationFailed(format!(
            "unknown embedding model: {}",
            other
        ))),
    }
}

fn dimension_of(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::AllMiniLML6V2 => 384,
        EmbeddingModel::AllMiniLML12V2 => 384,
        EmbeddingModel::BGESmallENV15 => 384,
        EmbeddingModel::BGEBaseENV15 => 768,
        _ => 384,
    }
}
