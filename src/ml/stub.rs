use super::encoder::Encoder;
use crate::error::Result;
use async_trait::async_trait;
use ndarray::Array2;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Placeholder encoder producing seeded standard-normal vectors.
///
/// Output depends only on the seed and the batch length, never on the
/// inputs themselves, so offline builds and tests are reproducible.
#[derive(Debug, Clone)]
pub struct StubEncoder {
    dimension: usize,
    image_seed: u64,
    text_seed: u64,
}

impl StubEncoder {
    pub fn new(dimension: usize, image_seed: u64, text_seed: u64) -> Self {
        Self {
            dimension,
            image_seed,
            text_seed,
        }
    }

    fn sample(&self, rows: usize, seed: u64) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_simple_fn((rows, self.dimension), || StandardNormal.sample(&mut rng))
    }
}

impl Default for StubEncoder {
    fn default() -> Self {
        Self::new(512, 42, 43)
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    fn name(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_images(&self, image_urls: &[String]) -> Result<Array2<f32>> {
        Ok(self.sample(image_urls.len(), self.image_seed))
    }

    async fn encode_texts(&self, texts: &[String]) -> Result<Array2<f32>> {
        Ok(self.sample(texts.len(), self.text_seed))
    }
}
