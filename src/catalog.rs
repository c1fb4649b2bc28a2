//! Paginated catalog listing
//!
//! The listing service is a jqGrid backend: filters are a JSON document
//! sent as a string, and the response wraps the row set in a second layer
//! of JSON encoding.

use crate::config::Config;
use crate::error::{PatchError, Result};
use crate::session::Session;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub const LISTING_PATH: &str = "/Service/CollectionInfoService.svc/GetAssetsListingOfCollection";

/// Date format the service compares `CREATED_DATE` against (e.g. `05-Jul-2021`)
pub const FILTER_DATE_FORMAT: &str = "%d-%b-%Y";

/// Rows requested by the informational count query at connect time
pub const COUNT_QUERY_ROWS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Title,
    CreatedDate,
}

impl SortColumn {
    fn field(self) -> &'static str {
        match self {
            SortColumn::Title => "TITLE",
            SortColumn::CreatedDate => "CREATED_DATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Listing parameters. `limit: None` means "every row the session knows of".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub since: Option<NaiveDate>,
    pub search: Option<String>,
    pub sort: Option<Sort>,
    pub limit: Option<u32>,
    pub page: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            since: None,
            search: None,
            sort: None,
            limit: None,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRule {
    pub field: &'static str,
    pub op: &'static str,
    pub data: String,
}

/// Conjunction of filter predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(rename = "groupOp")]
    pub group_op: &'static str,
    pub rules: Vec<FilterRule>,
}

impl Filter {
    pub fn new(since: Option<NaiveDate>, search: Option<&str>) -> Self {
        let mut rules = Vec::new();
        if let Some(date) = since {
            rules.push(FilterRule {
                field: "CREATED_DATE",
                op: "ge",
                data: date.format(FILTER_DATE_FORMAT).to_string(),
            });
        }
        if let Some(text) = search {
            rules.push(FilterRule {
                field: "TITLE",
                op: "cn",
                data: text.to_string(),
            });
        }
        Self {
            group_op: "AND",
            rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The string-encoded form the service expects; empty when there are no rules.
    pub fn encode(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }
        Ok(serde_json::to_string(self)?)
    }
}

/// Request body for the listing endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ListingRequest {
    #[serde(rename = "collectionId")]
    pub collection_id: u32,
    #[serde(rename = "_search")]
    pub search: bool,
    pub rows: u32,
    pub page: u32,
    pub filters: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidx: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sord: Option<&'static str>,
}

impl ListingRequest {
    pub fn new(collection_id: u32, query: &CatalogQuery, rows: u32) -> Result<Self> {
        let filter = Filter::new(query.since, query.search.as_deref());
        Ok(Self {
            collection_id,
            search: !filter.is_empty(),
            rows,
            page: query.page,
            filters: filter.encode()?,
            sidx: query.sort.map(|s| s.column.field()),
            sord: query.sort.map(|s| s.direction.as_str()),
        })
    }

    /// The informational query issued right after login.
    pub fn count(collection_id: u32) -> Self {
        Self {
            collection_id,
            search: false,
            rows: COUNT_QUERY_ROWS,
            page: 1,
            filters: String::new(),
            sidx: None,
            sord: None,
        }
    }
}

/// One entry of the catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "STANDARDASSETID", deserialize_with = "string_or_number")]
    pub asset_id: String,
    #[serde(rename = "TITLE")]
    pub title: String,
    #[serde(rename = "CREATED_DATE", default)]
    pub created_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    #[serde(rename = "Total", default)]
    pub total: u32,
    #[serde(rename = "Rows", default)]
    pub rows: Vec<CatalogRow>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { d: String },
    Bare(String),
}

/// Decode a listing response body: a JSON string (bare or in a WCF `d`
/// envelope) whose contents are the listing document.
pub fn decode_listing(body: &str) -> Result<Listing> {
    let inner = match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope::Wrapped { d }) | Ok(Envelope::Bare(d)) => d,
        Err(e) => {
            return Err(PatchError::CatalogParse(format!(
                "expected a JSON-encoded string: {e}"
            )));
        }
    };

    serde_json::from_str(&inner)
        .map_err(|e| PatchError::CatalogParse(format!("malformed listing document: {e}")))
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// Issue one listing request with the session's client.
pub async fn fetch_listing(
    config: &Config,
    session: &Session,
    request: &ListingRequest,
) -> Result<Listing> {
    let url = config.url(LISTING_PATH);
    tracing::debug!(
        "POST {} collection={} page={} rows={} search={}",
        url,
        request.collection_id,
        request.page,
        request.rows,
        request.search
    );

    let response = session
        .client()
        .post(&url)
        .json(request)
        .send()
        .await
        .map_err(|e| PatchError::CatalogUnavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PatchError::CatalogUnavailable(format!("HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| PatchError::CatalogUnavailable(e.to_string()))?;
    decode_listing(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_filter_since_only() {
        let filter = Filter::new(Some(date(2021, 7, 5)), None);
        let encoded: Value = serde_json::from_str(&filter.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "groupOp": "AND",
                "rules": [{"field": "CREATED_DATE", "op": "ge", "data": "05-Jul-2021"}]
            })
        );
    }

    #[test]
    fn test_filter_search_only() {
        let filter = Filter::new(None, Some("Windows 10"));
        let encoded: Value = serde_json::from_str(&filter.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "groupOp": "AND",
                "rules": [{"field": "TITLE", "op": "cn", "data": "Windows 10"}]
            })
        );
    }

    #[test]
    fn test_filter_both_predicates() {
        let filter = Filter::new(Some(date(2020, 1, 14)), Some("Office"));
        assert_eq!(filter.rules.len(), 2);
        assert_eq!(filter.rules[0].field, "CREATED_DATE");
        assert_eq!(filter.rules[0].data, "14-Jan-2020");
        assert_eq!(filter.rules[1].field, "TITLE");
        assert_eq!(filter.group_op, "AND");
    }

    #[test]
    fn test_no_filter_disables_search() {
        let request = ListingRequest::new(15, &CatalogQuery::default(), 100).unwrap();
        assert!(!request.search);
        assert_eq!(request.filters, "");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({"collectionId": 15, "_search": false, "rows": 100, "page": 1, "filters": ""})
        );
    }

    #[test]
    fn test_request_with_filter_and_sort() {
        let query = CatalogQuery {
            search: Some("KB".to_string()),
            sort: Some(Sort {
                column: SortColumn::CreatedDate,
                direction: SortDirection::Descending,
            }),
            page: 2,
            ..Default::default()
        };
        let request = ListingRequest::new(734, &query, 50).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["_search"], json!(true));
        assert_eq!(body["page"], json!(2));
        assert_eq!(body["sidx"], json!("CREATED_DATE"));
        assert_eq!(body["sord"], json!("desc"));
        assert!(body["filters"].as_str().unwrap().contains("\"cn\""));
    }

    #[test]
    fn test_count_request() {
        let request = ListingRequest::count(733);
        assert_eq!(request.rows, 15);
        assert_eq!(request.page, 1);
        assert!(!request.search);
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_decode_wrapped_listing() {
        let inner = json!({
            "Total": 2,
            "Rows": [
                {"STANDARDASSETID": 1001, "TITLE": "July 2021 Windows 10 (KB1)", "CREATED_DATE": "13-Jul-2021", "EXTRA": 1},
                {"STANDARDASSETID": "1002", "TITLE": "Toolkit", "CREATED_DATE": "14-Jul-2021"}
            ]
        })
        .to_string();
        let body = json!({ "d": inner }).to_string();

        let listing = decode_listing(&body).unwrap();
        assert_eq!(listing.total, 2);
        assert_eq!(listing.rows[0].asset_id, "1001");
        assert_eq!(listing.rows[1].asset_id, "1002");
        assert_eq!(listing.rows[1].title, "Toolkit");
    }

    #[test]
    fn test_decode_bare_string_listing() {
        let inner = json!({"Total": 0, "Rows": []}).to_string();
        let body = Value::String(inner).to_string();
        let listing = decode_listing(&body).unwrap();
        assert_eq!(listing.total, 0);
        assert!(listing.rows.is_empty());
    }

    #[test]
    fn test_decode_rejects_unencoded_object() {
        let body = json!({"Total": 1, "Rows": []}).to_string();
        assert!(matches!(decode_listing(&body), Err(PatchError::CatalogParse(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_inner_document() {
        let body = json!({"d": "{\"Rows\": 5}"}).to_string();
        assert!(matches!(decode_listing(&body), Err(PatchError::CatalogParse(_))));
    }
}
