//! Output records

use crate::catalog::CatalogRow;
use crate::classify::{self, Architecture};
use serde::ser::{Serialize, SerializeStruct, Serializer};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One downloadable file.
///
/// Bulletin records always serialise all ten fields, with `null` for
/// attributes the classifier could not derive. Records from the other
/// repositories carry only the five common fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub title: String,
    pub filename: String,
    pub architecture: Option<Architecture>,
    pub product: Option<String>,
    pub size_mb: f64,
    pub download_link: String,
    pub posted_date: String,
    pub guid: Option<String>,
    pub disa_date: Option<String>,
    pub kb: Option<String>,
    /// Exact size from the probe; `size_mb` is rounded
    pub size_bytes: u64,
    /// Selects the full bulletin shape on output
    pub bulletin: bool,
}

impl FileRecord {
    /// Reduced record used for every repository except the bulletins.
    pub fn plain(row: &CatalogRow, url: &str, filename: &str, size_bytes: u64) -> Self {
        Self {
            title: row.title.clone(),
            filename: filename.to_string(),
            architecture: None,
            product: None,
            size_mb: size_mb(size_bytes),
            download_link: url.to_string(),
            posted_date: row.created_date.clone(),
            guid: None,
            disa_date: None,
            kb: None,
            size_bytes,
            bulletin: false,
        }
    }

    /// Full record with attributes derived from the title and filename.
    pub fn bulletin(row: &CatalogRow, url: &str, filename: &str, size_bytes: u64) -> Self {
        let c = classify::classify(&row.title, filename);
        Self {
            title: c.clean_title,
            architecture: c.architecture,
            product: c.product,
            guid: c.guid,
            disa_date: c.disa_date,
            kb: c.kb,
            bulletin: true,
            ..Self::plain(row, url, filename, size_bytes)
        }
    }
}

impl Serialize for FileRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.bulletin { 10 } else { 5 };
        let mut s = serializer.serialize_struct("FileRecord", len)?;
        s.serialize_field("Title", &self.title)?;
        s.serialize_field("FileName", &self.filename)?;
        if self.bulletin {
            s.serialize_field("Architecture", &self.architecture)?;
            s.serialize_field("Product", &self.product)?;
        }
        s.serialize_field("SizeMB", &self.size_mb)?;
        s.serialize_field("DownloadLink", &self.download_link)?;
        s.serialize_field("PostedDate", &self.posted_date)?;
        if self.bulletin {
            s.serialize_field("GUID", &self.guid)?;
            s.serialize_field("DisaDate", &self.disa_date)?;
            s.serialize_field("KB", &self.kb)?;
        }
        s.end()
    }
}

/// Bytes to megabytes, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(title: &str) -> CatalogRow {
        CatalogRow {
            asset_id: "42".to_string(),
            title: title.to_string(),
            created_date: "13-Jul-2021".to_string(),
        }
    }

    #[test]
    fn test_size_mb_rounding() {
        assert_eq!(size_mb(0), 0.0);
        assert_eq!(size_mb(1024 * 1024), 1.0);
        assert_eq!(size_mb(1_500_000), 1.43);
        assert_eq!(size_mb(5 * 1024 * 1024 + 5000), 5.0);
    }

    #[test]
    fn test_plain_record_shape() {
        let record = FileRecord::plain(
            &row("SCAP Toolkit"),
            "https://x/dl?id=1",
            "scap.zip",
            2097152,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "Title": "SCAP Toolkit",
                "FileName": "scap.zip",
                "SizeMB": 2.0,
                "DownloadLink": "https://x/dl?id=1",
                "PostedDate": "13-Jul-2021"
            })
        );
    }

    #[test]
    fn test_bulletin_record_shape() {
        let record = FileRecord::bulletin(
            &row("July 2021 Windows 10 Version 21H1 (KB5004237)"),
            "https://x/dl?id=2",
            "windows10.0-kb5004237-x64_41103a2c.msu",
            1048576,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "Title": "Windows 10 Version 21H1",
                "FileName": "windows10.0-kb5004237-x64_41103a2c.msu",
                "Architecture": "x64",
                "Product": "Windows 10 Version 21H1",
                "SizeMB": 1.0,
                "DownloadLink": "https://x/dl?id=2",
                "PostedDate": "13-Jul-2021",
                "GUID": "41103a2c",
                "DisaDate": "July",
                "KB": "5004237"
            })
        );
    }

    #[test]
    fn test_bulletin_shape_is_fixed_without_markers() {
        let record = FileRecord::bulletin(
            &row("July 2021 Servicing Stack Update (KB5004237)"),
            "https://x/dl?id=3",
            "ssu.msu",
            0,
        );
        let value = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "Architecture",
                "DisaDate",
                "DownloadLink",
                "FileName",
                "GUID",
                "KB",
                "PostedDate",
                "Product",
                "SizeMB",
                "Title"
            ]
        );
        assert!(value["Architecture"].is_null());
        assert!(value["Product"].is_null());
        assert!(value["GUID"].is_null());
        assert_eq!(value["KB"], "5004237");
    }
}
