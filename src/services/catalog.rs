use crate::{
    error::{ApiError, Result},
    models::CatalogRecord,
};
use csv::ReaderBuilder;
use log::{info, warn};
use std::{collections::HashMap, fs::File, path::Path};

/// Catalog metadata in a fixed row order, addressable by item id or row position.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    rows: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self> {
        let mut rows = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            if rows.insert(record.item_id.clone(), row).is_some() {
                return Err(ApiError::InvalidInput(format!(
                    "duplicate catalog item id {}",
                    record.item_id
                )));
            }
        }
        Ok(Self { records, rows })
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ApiError::ArtifactLoad(format!("cannot open catalog {}: {}", path.display(), e))
        })?;
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize::<CatalogRecord>().enumerate() {
            match result {
                Ok(record) if !record.item_id.trim().is_empty() => records.push(record),
                Ok(_) => warn!("Skipping catalog row {} without item_id", line + 1),
                Err(e) => {
                    return Err(ApiError::ArtifactLoad(format!(
                        "malformed catalog row {} in {}: {}",
                        line + 1,
                        path.display(),
                        e
                    )))
                }
            }
        }

        info!("Loaded {} catalog records from {}", records.len(), path.display());
        Self::from_records(records)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn lookup(&self, item_id: &str) -> Result<&CatalogRecord> {
        self.rows
            .get(item_id)
            .map(|&row| &self.records[row])
            .ok_or_else(|| {
                ApiError::NotFound(format!("Catalog record for item {} not found", item_id))
            })
    }

    pub fn record_at(&self, row: usize) -> &CatalogRecord {
        &self.records[row]
    }

    pub fn category_at(&self, row: usize) -> Option<&str> {
        self.records.get(row).and_then(|r| r.category.as_deref())
    }

    /// Reorder rows to follow `ids`, requiring a one-to-one match.
    pub fn aligned_to(mut self, ids: &[String]) -> Result<Self> {
        if ids.len() != self.records.len() {
            return Err(ApiError::ArtifactLoad(format!(
                "catalog has {} records but the embedding store has {} ids",
                self.records.len(),
                ids.len()
            )));
        }

        let mut slots: Vec<Option<CatalogRecord>> =
            self.records.drain(..).map(Some).collect();
        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self
                .rows
                .get(id)
                .and_then(|&row| slots[row].take())
                .ok_or_else(|| {
                    ApiError::ArtifactLoad(format!("item {} has no catalog record", id))
                })?;
            ordered.push(record);
        }

        Self::from_records(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::test_record;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_and_not_found() {
        let catalog = Catalog::from_records(vec![test_record("a", "tops")]).unwrap();

        assert_eq!(catalog.lookup("a").unwrap().category.as_deref(), Some("tops"));
        assert!(matches!(catalog.lookup("b"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_aligned_to_reorders_rows() {
        let catalog = Catalog::from_records(vec![
            test_record("a", "tops"),
            test_record("b", "shoes"),
        ])
        .unwrap();

        let aligned = catalog.aligned_to(&ids(&["b", "a"])).unwrap();
        assert_eq!(aligned.record_at(0).item_id, "b");
        assert_eq!(aligned.category_at(1), Some("tops"));
        assert_eq!(aligned.lookup("a").unwrap().item_id, "a");
    }

    #[test]
    fn test_aligned_to_rejects_missing_records() {
        let catalog = Catalog::from_records(vec![
            test_record("a", "tops"),
            test_record("b", "shoes"),
        ])
        .unwrap();

        let result = catalog.aligned_to(&ids(&["a", "c"]));
        assert!(matches!(result, Err(ApiError::ArtifactLoad(_))));
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        let catalog = Catalog::from_records(vec![
            test_record("a", "tops"),
            test_record("b", "shoes"),
        ])
        .unwrap();

        catalog.write_csv(&path).unwrap();
        let loaded = Catalog::read_csv(&path).unwrap();

        assert_eq!(loaded.records(), catalog.records());
    }
}
