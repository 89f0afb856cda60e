//! On-disk snapshot consumed at startup and the immutable context built from it.

use crate::{
    error::{ApiError, Result},
    retrieval::{EmbeddingStore, FlatIpIndex, VectorIndex},
    services::catalog::Catalog,
};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

pub const CATALOG_FILE: &str = "catalog.csv";
pub const IDS_FILE: &str = "item_ids.json";
pub const VECTORS_FILE: &str = "item_vectors.bin";
pub const INDEX_META_FILE: &str = "index_meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub kind: String,
    pub dimension: usize,
    pub count: usize,
    pub built_at: DateTime<Utc>,
}

/// Everything a request needs, loaded once and never mutated.
pub struct ServingContext {
    pub store: EmbeddingStore,
    pub index: Box<dyn VectorIndex>,
    pub catalog: Catalog,
}

impl ServingContext {
    /// Build the index over `store` and align `catalog` rows to its ids.
    pub fn build(store: EmbeddingStore, catalog: Catalog) -> Result<Self> {
        let catalog = catalog.aligned_to(store.ids())?;
        let index = FlatIpIndex::build(store.shared_vectors());
        Ok(Self {
            store,
            index: Box::new(index),
            catalog,
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub catalog: PathBuf,
    pub ids: PathBuf,
    pub vectors: PathBuf,
    pub index_meta: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            catalog: dir.join(CATALOG_FILE),
            ids: dir.join(IDS_FILE),
            vectors: dir.join(VECTORS_FILE),
            index_meta: dir.join(INDEX_META_FILE),
        }
    }
}

/// Persist ids, vectors and index metadata next to the catalog.
///
/// The catalog itself is written only when `catalog` is given; the build step
/// normally reads it from the same directory.
pub fn write_artifacts(
    dir: &Path,
    ids: &[String],
    vectors: &Array2<f32>,
    catalog: Option<&Catalog>,
) -> Result<IndexMeta> {
    if ids.len() != vectors.nrows() {
        return Err(ApiError::InvalidInput(format!(
            "{} ids but {} vectors",
            ids.len(),
            vectors.nrows()
        )));
    }

    fs::create_dir_all(dir)?;
    let paths = ArtifactPaths::in_dir(dir);

    if let Some(catalog) = catalog {
        catalog.write_csv(&paths.catalog)?;
    }

    let mut writer = BufWriter::new(File::create(&paths.ids)?);
    serde_json::to_writer(&mut writer, ids)?;
    writer.flush()?;

    let mut writer = BufWriter::new(File::create(&paths.vectors)?);
    bincode::serialize_into(&mut writer, vectors)?;
    writer.flush()?;

    let meta = IndexMeta {
        kind: FlatIpIndex::KIND.to_string(),
        dimension: vectors.ncols(),
        count: vectors.nrows(),
        built_at: Utc::now(),
    };
    let mut writer = BufWriter::new(File::create(&paths.index_meta)?);
    serde_json::to_writer_pretty(&mut writer, &meta)?;
    writer.flush()?;

    info!(
        count = meta.count,
        dimension = meta.dimension,
        dir = %dir.display(),
        "Wrote index artifacts"
    );
    Ok(meta)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ApiError::ArtifactLoad(format!("cannot open {}: {}", path.display(), e)))
}

/// Load the snapshot in `dir`. Any inconsistency between the files is fatal.
pub fn load_serving_context(dir: &Path) -> Result<ServingContext> {
    let paths = ArtifactPaths::in_dir(dir);

    let meta: IndexMeta = serde_json::from_reader(open(&paths.index_meta)?)
        .map_err(|e| ApiError::ArtifactLoad(format!("invalid index metadata: {}", e)))?;
    if meta.kind != FlatIpIndex::KIND {
        return Err(ApiError::ArtifactLoad(format!(
            "unsupported index kind {}",
            meta.kind
        )));
    }

    let ids: Vec<String> = serde_json::from_reader(open(&paths.ids)?)
        .map_err(|e| ApiError::ArtifactLoad(format!("invalid id list: {}", e)))?;
    let vectors: Array2<f32> = bincode::deserialize_from(open(&paths.vectors)?)
        .map_err(|e| ApiError::ArtifactLoad(format!("invalid vector file: {}", e)))?;

    if vectors.nrows() != meta.count || vectors.ncols() != meta.dimension {
        return Err(ApiError::ArtifactLoad(format!(
            "vector matrix is {}x{} but metadata says {}x{}",
            vectors.nrows(),
            vectors.ncols(),
            meta.count,
            meta.dimension
        )));
    }

    let store = EmbeddingStore::new(ids, vectors).map_err(|e| match e {
        ApiError::InvalidInput(msg) => ApiError::ArtifactLoad(msg),
        other => other,
    })?;
    let catalog = Catalog::read_csv(&paths.catalog)?;
    let context = ServingContext::build(store, catalog)?;

    info!(
        items = context.len(),
        dimension = context.store.dimension(),
        built_at = %meta.built_at,
        "Loaded serving context"
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::test_record;
    use ndarray::array;

    fn fixture() -> (Vec<String>, Array2<f32>, Catalog) {
        let ids = vec!["a".to_string(), "b".to_string()];
        let vectors = array![[1.0, 0.0], [0.0, 1.0]];
        let catalog = Catalog::from_records(vec![
            test_record("b", "shoes"),
            test_record("a", "tops"),
        ])
        .unwrap();
        (ids, vectors, catalog)
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let (ids, vectors, catalog) = fixture();

        let meta = write_artifacts(dir.path(), &ids, &vectors, Some(&catalog)).unwrap();
        assert_eq!(meta.count, 2);

        let context = load_serving_context(dir.path()).unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context.index.len(), 2);
        // Catalog rows follow the id order, not the CSV order.
        assert_eq!(context.catalog.record_at(0).item_id, "a");
        assert_eq!(context.catalog.category_at(1), Some("shoes"));
    }

    #[test]
    fn test_index_shares_the_store_matrix() {
        let (ids, vectors, catalog) = fixture();
        let store = EmbeddingStore::new(ids, vectors).unwrap();
        let context = ServingContext::build(store, catalog).unwrap();

        // One handle in the store, one in the index, one held here.
        let shared = context.store.shared_vectors();
        assert_eq!(std::sync::Arc::strong_count(&shared), 3);
    }

    #[test]
    fn test_missing_files_fail_loading() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_serving_context(dir.path());
        assert!(matches!(result, Err(ApiError::ArtifactLoad(_))));
    }

    #[test]
    fn test_catalog_mismatch_fails_loading() {
        let dir = tempfile::tempdir().unwrap();
        let (ids, vectors, _) = fixture();
        let catalog = Catalog::from_records(vec![test_record("a", "tops")]).unwrap();

        write_artifacts(dir.path(), &ids, &vectors, Some(&catalog)).unwrap();
        assert!(matches!(
            load_serving_context(dir.path()),
            Err(ApiError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_tampered_metadata_fails_loading() {
        let dir = tempfile::tempdir().unwrap();
        let (ids, vectors, catalog) = fixture();
        let mut meta = write_artifacts(dir.path(), &ids, &vectors, Some(&catalog)).unwrap();

        meta.dimension = 3;
        let file = File::create(dir.path().join(INDEX_META_FILE)).unwrap();
        serde_json::to_writer(file, &meta).unwrap();

        assert!(load_serving_context(dir.path()).is_err());
    }
}
