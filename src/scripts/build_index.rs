use crate::{
    config::Config,
    error::{ApiError, Result},
    ml::{blend, build_encoder, Encoder},
    services::{
        artifacts::{write_artifacts, IndexMeta, CATALOG_FILE},
        catalog::Catalog,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use ndarray::Array2;
use std::path::Path;

/// Encode both modalities for the whole catalog in one call each, so the
/// seeded stub yields one distinct row per item in catalog order.
async fn encode_catalog(
    encoder: &dyn Encoder,
    catalog: &Catalog,
    image_weight: f32,
    text_weight: f32,
) -> Result<Array2<f32>> {
    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );

    let images: Vec<String> = catalog
        .records()
        .iter()
        .map(|r| r.image_url.clone().unwrap_or_default())
        .collect();
    let texts: Vec<String> = catalog.records().iter().map(|r| r.searchable_text()).collect();

    pb.set_message("images");
    let image_vectors = encoder.encode_images(&images).await?;
    pb.inc(1);

    pb.set_message("texts");
    let text_vectors = encoder.encode_texts(&texts).await?;
    pb.inc(1);

    pb.set_message("blending");
    let blended = blend(&image_vectors, &text_vectors, image_weight, text_weight)?;
    pb.inc(1);
    pb.finish_with_message("encoded");

    if blended.nrows() != catalog.len() {
        return Err(ApiError::ModelError(format!(
            "encoder returned {} rows for {} items",
            blended.nrows(),
            catalog.len()
        )));
    }
    Ok(blended)
}

/// Encode every item in `data_dir/catalog.csv` and write the vector artifacts
/// next to it.
pub async fn build_index(config: &Config, data_dir: &Path) -> Result<IndexMeta> {
    info!("🚀 Building index in {}", data_dir.display());

    let catalog = Catalog::read_csv(&data_dir.join(CATALOG_FILE))?;
    if catalog.is_empty() {
        return Err(ApiError::InvalidInput(format!(
            "{} has no items to index",
            data_dir.join(CATALOG_FILE).display()
        )));
    }
    let missing_images = catalog
        .records()
        .iter()
        .filter(|r| r.image_url.is_none())
        .count();
    if missing_images > 0 {
        warn!("⚠️  {} items have no image url", missing_images);
    }

    let encoder = build_encoder(&config.encoder)?;
    info!(
        "🤖 Encoding {} items with the {} encoder (dim {})",
        catalog.len(),
        encoder.name(),
        encoder.dimension()
    );

    let vectors = encode_catalog(
        encoder.as_ref(),
        &catalog,
        config.encoder.image_weight,
        config.encoder.text_weight,
    )
    .await?;

    let ids: Vec<String> = catalog.records().iter().map(|r| r.item_id.clone()).collect();
    let meta = write_artifacts(data_dir, &ids, &vectors, None)?;

    info!("🎉 Indexed {} items ({} dims)", meta.count, meta.dimension);
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::catalog::test_record, services::load_serving_context};

    fn small_config() -> Config {
        let mut config = Config::default();
        config.encoder.dimension = 16;
        config
    }

    #[tokio::test]
    async fn test_build_index_produces_loadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let records = (0..70)
            .map(|i| test_record(&format!("item-{}", i), if i % 2 == 0 { "tops" } else { "shoes" }))
            .collect();
        Catalog::from_records(records)
            .unwrap()
            .write_csv(&dir.path().join(CATALOG_FILE))
            .unwrap();

        let meta = build_index(&small_config(), dir.path()).await.unwrap();
        assert_eq!(meta.count, 70);
        assert_eq!(meta.dimension, 16);

        let context = load_serving_context(dir.path()).unwrap();
        assert_eq!(context.len(), 70);
        let row = context.store.vector_at(0);
        assert!((row.dot(&row) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_build_index_is_deterministic_with_stub() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for dir in [&first, &second] {
            Catalog::from_records(vec![test_record("a", "tops"), test_record("b", "shoes")])
                .unwrap()
                .write_csv(&dir.path().join(CATALOG_FILE))
                .unwrap();
            build_index(&small_config(), dir.path()).await.unwrap();
        }

        let a = load_serving_context(first.path()).unwrap();
        let b = load_serving_context(second.path()).unwrap();
        assert_eq!(a.store.all_vectors(), b.store.all_vectors());
    }

    #[tokio::test]
    async fn test_build_index_without_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_index(&small_config(), dir.path()).await;
        assert!(matches!(result, Err(ApiError::ArtifactLoad(_))));
    }
}
