use crate::error::{ApiError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Embedding backend used by the offline build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    Stub,
    HuggingFace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    pub backend: EncoderBackend,
    pub dimension: usize,
    pub image_seed: u64,
    pub text_seed: u64,
    /// Blend weights applied before normalization: `w_img * image + w_txt * text`.
    pub image_weight: f32,
    pub text_weight: f32,
    pub huggingface_api_key: Option<String>,
    pub huggingface_base_url: String,
    pub huggingface_text_model: String,
    pub huggingface_image_model: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Number of nearest neighbours fetched before diversification.
    pub candidate_pool: usize,
    pub mmr_lambda: f32,
    pub default_k: usize,
    pub default_target_category: String,
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load configuration from defaults, an optional `recommender.toml` and
    /// `APP_*` environment variables (nested keys use `__`, e.g.
    /// `APP_ENCODER__BACKEND=huggingface`).
    pub fn load() -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            .set_default("data_dir", "data")?
            .set_default("candidate_pool", 200)?
            .set_default("mmr_lambda", 0.2)?
            .set_default("default_k", 10)?
            .set_default("default_target_category", "shoes")?
            .set_default("encoder.backend", "stub")?
            .set_default("encoder.dimension", 512)?
            .set_default("encoder.image_seed", 42)?
            .set_default("encoder.text_seed", 43)?
            .set_default("encoder.image_weight", 0.7)?
            .set_default("encoder.text_weight", 0.3)?
            .set_default("encoder.huggingface_base_url", "https://api-inference.huggingface.co")?
            .set_default(
                "encoder.huggingface_text_model",
                "sentence-transformers/clip-ViT-B-32-multilingual-v1",
            )?
            .set_default("encoder.huggingface_image_model", "openai/clip-vit-base-patch32")?
            .set_default("encoder.timeout_seconds", 30)?
            .set_default("encoder.retry_attempts", 3)?
            .set_default("encoder.retry_delay_ms", 500)?
            .set_default("encoder.cache_size", 1024)?
            .add_source(::config::File::with_name("recommender").required(false))
            .add_source(
                ::config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(ApiError::ConfigError(format!(
                "mmr_lambda must be within [0, 1], got {}",
                self.mmr_lambda
            )));
        }
        if self.candidate_pool == 0 {
            return Err(ApiError::ConfigError(
                "candidate_pool must be positive".to_string(),
            ));
        }
        if self.default_k == 0 {
            return Err(ApiError::ConfigError("default_k must be positive".to_string()));
        }
        if self.encoder.dimension == 0 {
            return Err(ApiError::ConfigError(
                "encoder.dimension must be positive".to_string(),
            ));
        }
        if self.encoder.image_weight < 0.0
            || self.encoder.text_weight < 0.0
            || self.encoder.image_weight + self.encoder.text_weight <= 0.0
        {
            return Err(ApiError::ConfigError(
                "encoder weights must be non-negative and not both zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: EncoderBackend::Stub,
            dimension: 512,
            image_seed: 42,
            text_seed: 43,
            image_weight: 0.7,
            text_weight: 0.3,
            huggingface_api_key: None,
            huggingface_base_url: "https://api-inference.huggingface.co".to_string(),
            huggingface_text_model: "sentence-transformers/clip-ViT-B-32-multilingual-v1"
                .to_string(),
            huggingface_image_model: "openai/clip-vit-base-patch32".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            cache_size: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            candidate_pool: 200,
            mmr_lambda: 0.2,
            default_k: 10,
            default_target_category: "shoes".to_string(),
            encoder: EncoderConfig::default(),
        }
    }
}
