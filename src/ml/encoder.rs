use crate::error::{ApiError, Result};
use async_trait::async_trait;
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Turns catalog inputs into fixed-dimension vectors, one row per input.
#[async_trait]
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn encode_images(&self, image_urls: &[String]) -> Result<Array2<f32>>;

    async fn encode_texts(&self, texts: &[String]) -> Result<Array2<f32>>;
}

/// Scale `vector` to unit length in place; an all-zero vector is left as is.
pub fn l2_normalize(mut vector: ArrayViewMut1<f32>) {
    let norm = vector.dot(&vector).sqrt();
    if norm > 0.0 {
        vector.mapv_inplace(|x| x / norm);
    }
}

pub fn l2_normalize_rows(vectors: &mut Array2<f32>) {
    for row in vectors.axis_iter_mut(Axis(0)) {
        l2_normalize(row);
    }
}

/// `normalize(image_weight * images + text_weight * texts)`
pub fn blend(
    images: &Array2<f32>,
    texts: &Array2<f32>,
    image_weight: f32,
    text_weight: f32,
) -> Result<Array2<f32>> {
    if images.dim() != texts.dim() {
        return Err(ApiError::ModelError(format!(
            "image embeddings are {:?} but text embeddings are {:?}",
            images.dim(),
            texts.dim()
        )));
    }
    let mut blended = images * image_weight + texts * text_weight;
    l2_normalize_rows(&mut blended);
    Ok(blended)
}
