use super::encoder::{l2_normalize, Encoder};
use crate::{
    config::EncoderConfig,
    error::{ApiError, Result},
};
use async_trait::async_trait;
use log::{debug, info, warn};
use lru::LruCache;
use ndarray::{Array1, Array2};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, sync::Mutex, time::Duration};

// Text processing limits
const MAX_TEXT_PREVIEW_LENGTH: usize = 100;

/// Embeddings from the HuggingFace inference API.
///
/// Texts are sent to the text model as JSON; images are downloaded and their
/// bytes posted to the image model. Every vector is resized to the configured
/// dimension and L2-normalized before it leaves this type.
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    text_model_url: String,
    image_model_url: String,
    dimension: usize,
    retry_attempts: u32,
    retry_delay_ms: u64,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

enum Payload<'a> {
    Text(&'a str),
    Image(&'a [u8]),
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let api_key = config
            .huggingface_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "encoder.huggingface_api_key is required for the huggingface backend"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.huggingface_base_url.trim_end_matches('/');
        let text_model_url = format!("{}/models/{}", base_url, config.huggingface_text_model);
        let image_model_url = format!("{}/models/{}", base_url, config.huggingface_image_model);
        info!(
            "HuggingFace encoder using text model {} and image model {}",
            config.huggingface_text_model, config.huggingface_image_model
        );

        let cache_size = NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            client,
            api_key,
            text_model_url,
            image_model_url,
            dimension: config.dimension,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay_ms: config.retry_delay_ms,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    fn cached(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: String, embedding: &[f32]) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, embedding.to_vec());
        }
    }

    async fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let text = preprocess_text(text);
        let cache_key = format!("text_{}", text);
        if let Some(embedding) = self.cached(&cache_key) {
            return Ok(embedding);
        }

        debug!(
            "Encoding text (length: {}): {}",
            text.len(),
            text.chars().take(MAX_TEXT_PREVIEW_LENGTH).collect::<String>()
        );
        let embedding = self
            .with_retry(|| self.request(&self.text_model_url, Payload::Text(&text)))
            .await?;
        self.remember(cache_key, &embedding);
        Ok(embedding)
    }

    async fn encode_image(&self, url: &str) -> Result<Vec<f32>> {
        // Items without an image contribute only their text vector.
        if url.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }
        let cache_key = format!("image_{}", url);
        if let Some(embedding) = self.cached(&cache_key) {
            return Ok(embedding);
        }

        let bytes = match self.download(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Image download failed for {}: {}. Using text only", url, e);
                return Ok(vec![0.0; self.dimension]);
            }
        };
        let embedding = self
            .with_retry(|| self.request(&self.image_model_url, Payload::Image(&bytes)))
            .await?;
        self.remember(cache_key, &embedding);
        Ok(embedding)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn with_retry<F, Fut>(&self, operation: F) -> Result<Vec<f32>>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<f32>>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if attempt < self.retry_attempts => {
                    let delay = self.retry_delay_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt, self.retry_attempts, e, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(&self, model_url: &str, payload: Payload<'_>) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Request<'a> {
            inputs: &'a str,
            options: Options,
        }

        #[derive(Serialize)]
        struct Options {
            wait_for_model: bool,
            use_cache: bool,
        }

        let builder = self
            .client
            .post(model_url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let builder = match payload {
            Payload::Text(inputs) => builder.json(&Request {
                inputs,
                options: Options {
                    wait_for_model: true,
                    use_cache: true,
                },
            }),
            Payload::Image(bytes) => builder
                .header("Content-Type", "application/octet-stream")
                .body(bytes.to_vec()),
        };

        let response = builder.send().await.map_err(|e| {
            ApiError::ExternalServiceError(format!("Failed to send request to model API: {}", e))
        })?;
        self.process_api_response(response).await
    }

    async fn process_api_response(&self, response: Response) -> Result<Vec<f32>> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ApiError::ExternalServiceError(
                    "Authentication failed. Please check your HuggingFace API key.".to_string(),
                ),
                404 => ApiError::ModelError("Model not found on HuggingFace".to_string()),
                429 => ApiError::ExternalServiceError(
                    "Rate limit exceeded by HuggingFace API".to_string(),
                ),
                _ => ApiError::ExternalServiceError(format!(
                    "HuggingFace API returned non-success status: {} - {}",
                    status, text
                )),
            });
        }

        let body = response.text().await?;
        let embedding = parse_embedding(&body)?;
        debug!("Got embedding of size {} from HuggingFace API", embedding.len());
        let mut embedding = Array1::from(resize(&embedding, self.dimension));
        l2_normalize(embedding.view_mut());
        Ok(embedding.to_vec())
    }
}

#[async_trait]
impl Encoder for HuggingFaceEmbedder {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_images(&self, image_urls: &[String]) -> Result<Array2<f32>> {
        let mut flat = Vec::with_capacity(image_urls.len() * self.dimension);
        for url in image_urls {
            flat.extend(self.encode_image(url).await?);
        }
        Ok(Array2::from_shape_vec((image_urls.len(), self.dimension), flat)?)
    }

    async fn encode_texts(&self, texts: &[String]) -> Result<Array2<f32>> {
        let mut flat = Vec::with_capacity(texts.len() * self.dimension);
        for text in texts {
            flat.extend(self.encode_text(text).await?);
        }
        Ok(Array2::from_shape_vec((texts.len(), self.dimension), flat)?)
    }
}

fn preprocess_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty text".to_string();
    }
    trimmed.to_string()
}

/// Accepts `[f, ...]`, `[[f, ...]]`, `{"embedding": [...]}` and
/// `{"embeddings": [[...]]}` response bodies.
fn parse_embedding(body: &str) -> Result<Vec<f32>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EmbeddingResponse {
        Flat(Vec<f32>),
        Nested(Vec<Vec<f32>>),
        Single { embedding: Vec<f32> },
        Batch { embeddings: Vec<Vec<f32>> },
    }

    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::ModelError(format!("Failed to parse embedding response: {}", e))
    })?;
    let embedding = match parsed {
        EmbeddingResponse::Flat(v) | EmbeddingResponse::Single { embedding: v } => v,
        EmbeddingResponse::Nested(rows) | EmbeddingResponse::Batch { embeddings: rows } => {
            rows.into_iter().next().unwrap_or_default()
        }
    };

    if embedding.is_empty() {
        return Err(ApiError::ModelError(
            "Failed to extract embedding from response".to_string(),
        ));
    }
    Ok(embedding)
}

/// Resize by window averaging (shrinking) or linear interpolation (growing).
fn resize(embedding: &[f32], target_dim: usize) -> Vec<f32> {
    let input_dim = embedding.len();
    if input_dim == target_dim || input_dim == 0 {
        return embedding.to_vec();
    }

    if input_dim > target_dim {
        let ratio = input_dim as f32 / target_dim as f32;
        (0..target_dim)
            .map(|i| {
                let start = (i as f32 * ratio).floor() as usize;
                let end = (((i + 1) as f32 * ratio).floor() as usize).clamp(start + 1, input_dim);
                let window = &embedding[start..end];
                window.iter().sum::<f32>() / window.len() as f32
            })
            .collect()
    } else if input_dim == 1 || target_dim == 1 {
        vec![embedding[0]; target_dim]
    } else {
        let ratio = (input_dim - 1) as f32 / (target_dim - 1) as f32;
        (0..target_dim)
            .map(|i| {
                let exact = i as f32 * ratio;
                let lower = exact.floor() as usize;
                let upper = (lower + 1).min(input_dim - 1);
                let weight = exact - lower as f32;
                embedding[lower] * (1.0 - weight) + embedding[upper] * weight
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding_shapes() {
        assert_eq!(parse_embedding("[0.5, 1.0]").unwrap(), vec![0.5, 1.0]);
        assert_eq!(parse_embedding("[[0.5, 1.0], [2.0, 3.0]]").unwrap(), vec![0.5, 1.0]);
        assert_eq!(parse_embedding(r#"{"embedding": [1.0]}"#).unwrap(), vec![1.0]);
        assert_eq!(
            parse_embedding(r#"{"embeddings": [[2.0, 4.0]]}"#).unwrap(),
            vec![2.0, 4.0]
        );
    }

    #[test]
    fn test_parse_embedding_rejects_empty_and_garbage() {
        assert!(parse_embedding("[]").is_err());
        assert!(parse_embedding(r#"{"error": "loading"}"#).is_err());
    }

    #[test]
    fn test_resize_down_averages_windows() {
        let resized = resize(&[1.0, 3.0, 5.0, 7.0], 2);
        assert_eq!(resized, vec![2.0, 6.0]);
    }

    #[test]
    fn test_resize_up_interpolates() {
        let resized = resize(&[0.0, 1.0], 3);
        assert_eq!(resized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let config = EncoderConfig::default();
        assert!(matches!(
            HuggingFaceEmbedder::new(&config),
            Err(ApiError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_image_url_encodes_to_zeros() {
        let config = EncoderConfig {
            dimension: 4,
            huggingface_api_key: Some("hf_test".to_string()),
            ..EncoderConfig::default()
        };
        let embedder = HuggingFaceEmbedder::new(&config).unwrap();

        let vectors = embedder.encode_images(&[String::new()]).await.unwrap();
        assert_eq!(vectors.dim(), (1, 4));
        assert_eq!(vectors.sum(), 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_image_falls_back_to_zeros() {
        let config = EncoderConfig {
            dimension: 4,
            huggingface_api_key: Some("hf_test".to_string()),
            timeout_seconds: 2,
            ..EncoderConfig::default()
        };
        let embedder = HuggingFaceEmbedder::new(&config).unwrap();

        let urls = vec![String::new(), "http://127.0.0.1:1/dead.jpg".to_string()];
        let vectors = embedder.encode_images(&urls).await.unwrap();
        assert_eq!(vectors.dim(), (2, 4));
        assert_eq!(vectors.sum(), 0.0);
    }

    #[test]
    fn test_preprocess_text() {
        assert_eq!(preprocess_text("  red sneaker "), "red sneaker");
        assert_eq!(preprocess_text("   "), "empty text");
    }
}
