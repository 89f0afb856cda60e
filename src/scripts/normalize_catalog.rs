//! Merge per-brand product exports into the canonical `catalog.csv`.

use crate::{
    error::{ApiError, Result},
    models::CatalogRecord,
    services::catalog::Catalog,
};
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static LIST_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[|,;/\t]").expect("list separator pattern is valid"));

/// Canonical fields and the source column names accepted for each, in priority order.
const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Title, &["title", "name"]),
    (Field::ProductId, &["product_id", "sku", "id"]),
    (Field::ProductUrl, &["product_url", "url", "link"]),
    (Field::ImageUrl, &["image_url", "img", "image", "thumbnail"]),
    (
        Field::CurrentPrice,
        &["current_price", "price", "sale_price", "final_price"],
    ),
    (Field::OriginalPrice, &["original_price", "list_price", "msrp"]),
    (
        Field::Category,
        &["category", "subcategory", "type", "collection"],
    ),
    (Field::Sizes, &["available_sizes", "sizes", "size"]),
    (Field::Colors, &["available_colors", "color", "colors"]),
    (
        Field::Tags,
        &["labels", "tags", "label", "tag", "promotion", "notes"],
    ),
    (
        Field::Availability,
        &["availability", "stock_status", "in_stock", "status"],
    ),
];

/// Category buckets, checked in order; the first keyword hit wins.
const CATEGORY_BUCKETS: &[(&str, &[&str])] = &[
    ("bottoms", &["jean", "pant", "bottom", "trouser", "short", "skirt"]),
    ("outerwear", &["jacket", "coat", "outer", "hoodie", "sweater"]),
    ("dress", &["dress", "gown"]),
    ("shoes", &["shoe", "sneaker", "boot", "sandal", "heel", "trainer"]),
    (
        "tops",
        &["top", "tee", "t-shirt", "shirt", "blouse", "bra", "tank", "crew", "hooded"],
    ),
    ("accessories", &["bag", "belt", "hat", "cap", "scarf", "sock", "accessor"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Title,
    ProductId,
    ProductUrl,
    ImageUrl,
    CurrentPrice,
    OriginalPrice,
    Category,
    Sizes,
    Colors,
    Tags,
    Availability,
}

/// Column index of each canonical field for one source file's header.
struct ColumnMap(HashMap<Field, usize>);

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Self {
        let lowered: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let columns = FIELD_ALIASES
            .iter()
            .filter_map(|(field, aliases)| {
                aliases
                    .iter()
                    .find_map(|alias| lowered.get(*alias))
                    .map(|&i| (*field, i))
            })
            .collect();
        Self(columns)
    }

    fn get<'r>(&self, record: &'r StringRecord, field: Field) -> Option<&'r str> {
        self.0
            .get(&field)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            LIST_SEPARATORS
                .split(v)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn make_item_id(brand: &str, product_id: Option<&str>, url: Option<&str>) -> String {
    let base = format!(
        "{}:{}:{}",
        brand,
        product_id.unwrap_or_default(),
        url.unwrap_or_default()
    );
    let digest = format!("{:x}", Sha256::digest(base.as_bytes()));
    format!("{}:{}", brand.to_lowercase(), &digest[..10])
}

/// Map a raw (already lowercased) category onto one of the fixed buckets.
pub fn normalize_category(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }
    let bucket = CATEGORY_BUCKETS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| raw.contains(k)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or("other");
    Some(bucket.to_string())
}

fn parse_price(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.parse::<f64>().ok())
}

fn brand_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace("_products", ""))
        .unwrap_or_default()
}

/// Read a source export, trying a comma delimiter first and falling back to
/// semicolons when the header collapses into one column. Invalid UTF-8 is
/// replaced rather than rejected.
fn read_source(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let raw = fs::read(path)?;
    let text = String::from_utf8_lossy(&raw);
    let text = text.trim_start_matches('\u{feff}');

    for delimiter in [b',', b';'] {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = rdr.headers()?.clone();
        if headers.len() <= 1 && delimiter == b',' && headers.as_slice().contains(';') {
            continue;
        }

        let mut rows = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping bad line {} in {}: {}", line + 2, path.display(), e),
            }
        }
        return Ok((headers, rows));
    }

    Ok((StringRecord::new(), Vec::new()))
}

fn normalize_file(path: &Path) -> Result<Vec<CatalogRecord>> {
    let brand = brand_from_path(path);
    let source = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned());
    let (headers, rows) = read_source(path)?;
    if rows.is_empty() {
        warn!("Empty or unreadable: {}", path.display());
        return Ok(Vec::new());
    }
    info!("Processing {} with {} rows", path.display(), rows.len());

    let columns = ColumnMap::resolve(&headers);
    let records = rows
        .iter()
        .map(|row| {
            let product_id = columns.get(row, Field::ProductId);
            let url = columns.get(row, Field::ProductUrl);
            CatalogRecord {
                item_id: make_item_id(&brand, product_id, url),
                brand: brand.clone(),
                title: columns.get(row, Field::Title).map(str::to_string),
                category: columns.get(row, Field::Category).map(str::to_lowercase),
                color_list: split_list(columns.get(row, Field::Colors)),
                size_list: split_list(columns.get(row, Field::Sizes)),
                current_price: parse_price(columns.get(row, Field::CurrentPrice)),
                original_price: parse_price(columns.get(row, Field::OriginalPrice)),
                tags: split_list(columns.get(row, Field::Tags)),
                availability_status: columns.get(row, Field::Availability).map(str::to_string),
                product_url: url.map(str::to_string),
                image_url: columns.get(row, Field::ImageUrl).map(str::to_string),
                raw_source: source.clone(),
            }
        })
        .collect();
    Ok(records)
}

/// Dedupe by item id (first occurrence wins), drop untitled rows and bucket
/// categories.
pub fn finalize(records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.item_id.clone()))
        .filter(|r| r.title.is_some())
        .map(|mut r| {
            r.category = normalize_category(r.category.as_deref());
            r
        })
        .collect()
}

/// Normalize every `*.csv` in `source_dir` and write `output`.
pub fn normalize_catalog(source_dir: &Path, output: &Path) -> Result<Catalog> {
    let mut paths: Vec<PathBuf> = fs::read_dir(source_dir)
        .map_err(|e| {
            ApiError::InvalidInput(format!("cannot read {}: {}", source_dir.display(), e))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ApiError::InvalidInput(format!(
            "No CSVs found in {}",
            source_dir.display()
        )));
    }

    let mut records = Vec::new();
    for path in &paths {
        records.extend(normalize_file(path)?);
    }

    let catalog = Catalog::from_records(finalize(records))?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    catalog.write_csv(output)?;
    info!("Wrote {} with {} items", output.display(), catalog.len());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_on_all_separators() {
        assert_eq!(
            split_list(Some("S| M ,L;XL/2XL\t3XL")),
            vec!["S", "M", "L", "XL", "2XL", "3XL"]
        );
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_item_id_is_stable_and_prefixed() {
        let a = make_item_id("Zara", Some("123"), Some("https://z/1"));
        let b = make_item_id("Zara", Some("123"), Some("https://z/1"));
        let c = make_item_id("Zara", Some("124"), Some("https://z/1"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("zara:"));
        assert_eq!(a.len(), "zara:".len() + 10);
    }

    #[test]
    fn test_category_buckets() {
        assert_eq!(normalize_category(Some("Skinny Jeans")).as_deref(), Some("bottoms"));
        assert_eq!(normalize_category(Some("running sneakers")).as_deref(), Some("shoes"));
        assert_eq!(normalize_category(Some("graphic tee")).as_deref(), Some("tops"));
        assert_eq!(normalize_category(Some("perfume")).as_deref(), Some("other"));
        assert_eq!(normalize_category(None), None);
        assert_eq!(normalize_category(Some("denim shorts")).as_deref(), Some("bottoms"));
    }

    #[test]
    fn test_aliases_resolve_by_priority() {
        let headers = StringRecord::from(vec!["Name", "Price", "SALE_PRICE", "Image"]);
        let columns = ColumnMap::resolve(&headers);
        let row = StringRecord::from(vec!["Boot", "100", "80", "http://i/1.jpg"]);

        assert_eq!(columns.get(&row, Field::Title), Some("Boot"));
        assert_eq!(columns.get(&row, Field::CurrentPrice), Some("100"));
        assert_eq!(columns.get(&row, Field::ImageUrl), Some("http://i/1.jpg"));
        assert_eq!(columns.get(&row, Field::Category), None);
    }

    #[test]
    fn test_normalize_catalog_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let brands = dir.path().join("brands");
        fs::create_dir_all(&brands).unwrap();
        fs::write(
            brands.join("acme_products.csv"),
            "title,sku,url,price,category,sizes\n\
             Runner,1,http://a/1,59.5,Sneakers,S|M\n\
             Runner,1,http://a/1,59.5,Sneakers,S|M\n\
             ,2,http://a/2,10,Tee,\n",
        )
        .unwrap();
        fs::write(
            brands.join("north.csv"),
            "Name;Product_ID;Type\nParka;9;Winter Coat\n",
        )
        .unwrap();

        let output = dir.path().join("catalog.csv");
        let catalog = normalize_catalog(&brands, &output).unwrap();

        assert_eq!(catalog.len(), 2);
        let runner = &catalog.records()[0];
        assert_eq!(runner.brand, "acme");
        assert_eq!(runner.category.as_deref(), Some("shoes"));
        assert_eq!(runner.size_list, vec!["S", "M"]);
        assert_eq!(runner.current_price, Some(59.5));

        let parka = &catalog.records()[1];
        assert_eq!(parka.brand, "north");
        assert_eq!(parka.category.as_deref(), Some("outerwear"));
        assert!(parka.item_id.starts_with("north:"));

        assert_eq!(Catalog::read_csv(&output).unwrap().len(), 2);
    }

    #[test]
    fn test_no_sources_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = normalize_catalog(dir.path(), &dir.path().join("catalog.csv"));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }
}
