//! Text embedders used by the vector store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use ndarray::{Ix2, Ix3};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use sha2::{Digest, Sha256};
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};
use tracing::info;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProvider};

/// Texts sent through the ONNX session at once.
const INFERENCE_BATCH_SIZE: usize = 16;

/// Turns text into fixed-size, L2-normalized vectors.
pub trait Embedder {
    /// Identity recorded with a collection, e.g. `hash:256`.
    fn name(&self) -> String;

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_documents(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InferenceError("empty embedding output".to_string()))
    }
}

/// Build the embedder selected by configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    match config.provider {
        EmbeddingProvider::Onnx => Box::new(OnnxEmbedder::new(
            config.model_dir.clone(),
            config.max_tokens as usize,
        )),
        EmbeddingProvider::Hash => Box::new(HashEmbedder::new(config.hash_dimension)),
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercased alphanumeric token activates three buckets chosen from its
/// SHA-256 digest, so vectors are identical across platforms and releases.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        let dim = self.dimension as u64;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(bytes);

            embedding[(hash % dim) as usize] += 1.0;
            embedding[((hash >> 16) % dim) as usize] += 0.5;
            embedding[((hash >> 32) % dim) as usize] += 0.25;
        }

        normalize(&embedding)
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> String {
        format!("hash:{}", self.dimension)
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Sentence-embedding model run through ONNX Runtime.
///
/// The model directory must contain `model.onnx` and `tokenizer.json`. Loading
/// is deferred until the first text is embedded.
pub struct OnnxEmbedder {
    model_dir: PathBuf,
    max_tokens: usize,
    model: OnceLock<OnnxModel>,
}

impl OnnxEmbedder {
    pub fn new(model_dir: PathBuf, max_tokens: usize) -> Self {
        Self {
            model_dir,
            max_tokens,
            model: OnceLock::new(),
        }
    }

    fn model(&self) -> Result<&OnnxModel, EmbeddingError> {
        if let Some(model) = self.model.get() {
            return Ok(model);
        }
        let loaded = OnnxModel::load(&self.model_dir, self.max_tokens)?;
        Ok(self.model.get_or_init(|| loaded))
    }
}

impl Embedder for OnnxEmbedder {
    fn name(&self) -> String {
        let model = self
            .model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model_dir.display().to_string());
        format!("onnx:{}", model)
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model()?;
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(INFERENCE_BATCH_SIZE) {
            all_embeddings.extend(model.embed(chunk)?);
        }
        Ok(all_embeddings)
    }
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxModel {
    fn load(model_dir: &Path, max_tokens: usize) -> Result<Self, EmbeddingError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbeddingError::ModelNotFound(format!(
                "{} (set embedding.model_dir, or embedding.provider = \"hash\" to run without a model)",
                model_path.display()
            )));
        }

        info!(path = %model_path.display(), "loading embedding model");

        let session = Session::builder()
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        // Whole files are embedded, so long inputs must be cut down.
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for j in 0..ids.len() {
                input_ids[i * max_len + j] = i64::from(ids[j]);
                attention_mask[i * max_len + j] = i64::from(mask[j]);
                token_type_ids[i * max_len + j] = i64::from(types[j]);
            }
        }

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(([batch_size, max_len], attention_mask.clone()))
                .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array(([batch_size, max_len], token_type_ids))
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                input_ids_tensor,
                attention_mask_tensor,
                token_type_ids_tensor
            ])
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;

        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;

        let shape = output_array.shape().to_vec();
        let embeddings = match shape.len() {
            // Token embeddings: mean-pool over the attention mask.
            3 => {
                let hidden = output_array
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;
                let dimension = shape[2];
                (0..batch_size)
                    .map(|i| {
                        let mut pooled = vec![0.0f32; dimension];
                        let mut tokens = 0.0f32;
                        for j in 0..max_len {
                            if attention_mask[i * max_len + j] == 0 {
                                continue;
                            }
                            tokens += 1.0;
                            for (d, value) in pooled.iter_mut().enumerate() {
                                *value += hidden[[i, j, d]];
                            }
                        }
                        if tokens > 0.0 {
                            for value in pooled.iter_mut() {
                                *value /= tokens;
                            }
                        }
                        normalize(&pooled)
                    })
                    .collect()
            }
            // Already pooled sentence embeddings.
            2 => {
                let pooled = output_array
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;
                pooled
                    .outer_iter()
                    .map(|row| normalize(&row.to_vec()))
                    .collect()
            }
            _ => {
                return Err(EmbeddingError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    shape
                )));
            }
        };

        Ok(embeddings)
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_query("Hello world").unwrap();
        let b = embedder.embed_query("hello WORLD").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_similarity_tracks_overlap() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed_query("parse config file").unwrap();
        let close = embedder
            .embed_query("load and parse the config file")
            .unwrap();
        let far = embedder.embed_query("render a triangle").unwrap();

        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed_query("  ... ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_embedder_names() {
        assert_eq!(HashEmbedder::new(32).name(), "hash:32");
        let onnx = OnnxEmbedder::new(PathBuf::from("/models/all-MiniLM-L6-v2"), 256);
        assert_eq!(onnx.name(), "onnx:all-MiniLM-L6-v2");
    }

    #[test]
    fn test_onnx_missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = OnnxEmbedder::new(dir.path().to_path_buf(), 128);

        // Nothing to embed means nothing to load.
        assert!(embedder.embed_documents(&[]).unwrap().is_empty());

        let err = embedder.embed_query("anything").unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound(_)));
    }

    #[test]
    fn test_create_embedder_from_config() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hash,
            hash_dimension: 16,
            ..Default::default()
        };
        assert_eq!(create_embedder(&config).name(), "hash:16");
    }
}
