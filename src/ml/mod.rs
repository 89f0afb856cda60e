pub mod encoder;
pub mod huggingface_embedder;
pub mod stub;

pub use encoder::{blend, l2_normalize, l2_normalize_rows, Encoder};
pub use huggingface_embedder::HuggingFaceEmbedder;
pub use stub::StubEncoder;

use crate::{
    config::{EncoderBackend, EncoderConfig},
    error::Result,
};

/// Pick the encoder implementation named by the configuration.
pub fn build_encoder(config: &EncoderConfig) -> Result<Box<dyn Encoder>> {
    match config.backend {
        EncoderBackend::Stub => Ok(Box::new(StubEncoder::new(
            config.dimension,
            config.image_seed,
            config.text_seed,
        ))),
        EncoderBackend::HuggingFace => Ok(Box::new(HuggingFaceEmbedder::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_encoder_selects_stub() {
        let config = EncoderConfig {
            dimension: 8,
            ..EncoderConfig::default()
        };
        let encoder = build_encoder(&config).unwrap();
        assert_eq!(encoder.name(), "stub");
        assert_eq!(encoder.dimension(), 8);
    }

    #[test]
    fn test_build_encoder_selects_huggingface() {
        let config = EncoderConfig {
            backend: EncoderBackend::HuggingFace,
            huggingface_api_key: Some("hf_test".to_string()),
            ..EncoderConfig::default()
        };
        let encoder = build_encoder(&config).unwrap();
        assert_eq!(encoder.name(), "huggingface");
    }
}
