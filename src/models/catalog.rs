use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// List-valued catalog fields are kept as JSON arrays inside a single CSV cell.
mod json_list {
    use super::*;

    pub fn serialize<S>(values: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = serde_json::to_string(values).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(trimmed).map_err(serde::de::Error::custom)
    }
}

fn deserialize_optional_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse::<f64>().ok()))
}

/// One row of the canonical catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub item_id: String,
    pub brand: String,
    pub title: Option<String>,
    /// Normalized category bucket (`shoes`, `tops`, ...). Filtering compares
    /// this value exactly.
    pub category: Option<String>,
    #[serde(with = "json_list", default)]
    pub color_list: Vec<String>,
    #[serde(with = "json_list", default)]
    pub size_list: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_price")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_price")]
    pub original_price: Option<f64>,
    #[serde(with = "json_list", default)]
    pub tags: Vec<String>,
    pub availability_status: Option<String>,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub raw_source: Option<String>,
}

impl CatalogRecord {
    /// Text fed to the text encoder: brand, title, category and tags.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![self.brand.clone()];
        parts.push(self.title.clone().unwrap_or_default());
        parts.push(self.category.clone().unwrap_or_default());
        parts.push(self.tags.join(" "));
        parts.join(" ")
    }
}

#[cfg(test)]
pub(crate) fn test_record(item_id: &str, category: &str) -> CatalogRecord {
    CatalogRecord {
        item_id: item_id.to_string(),
        brand: "acme".to_string(),
        title: Some(format!("Item {}", item_id)),
        category: Some(category.to_string()),
        color_list: vec!["black".to_string()],
        size_list: Vec::new(),
        current_price: Some(19.99),
        original_price: None,
        tags: vec!["new".to_string()],
        availability_status: None,
        product_url: None,
        image_url: Some(format!("https://img.example/{}.jpg", item_id)),
        raw_source: Some("acme_products.csv".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_roundtrip_keeps_list_cells() {
        let record = test_record("acme:0123456789", "shoes");

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#"[""black""]"#));

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let parsed: CatalogRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_empty_cells_deserialize_to_defaults() {
        let data = "item_id,brand,title,category,color_list,size_list,current_price,original_price,tags,availability_status,product_url,image_url,raw_source\n\
                    acme:1,acme,Tee,,,,not-a-price,,,,,,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let parsed: CatalogRecord = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(parsed.category, None);
        assert!(parsed.color_list.is_empty());
        assert_eq!(parsed.current_price, None);
    }

    #[test]
    fn test_searchable_text() {
        let record = test_record("acme:1", "tops");
        assert_eq!(record.searchable_text(), "acme Item acme:1 tops new");
    }
}
