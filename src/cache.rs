//! Memoised per-row results
//!
//! Once a row key has been resolved its records are reused for the rest of
//! the process. With [`RowCacheKey::Title`] distinct assets that share a
//! title collide: the first one resolved answers for all of them.

use crate::catalog::CatalogRow;
use crate::config::RowCacheKey;
use crate::record::FileRecord;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResultCache {
    key: RowCacheKey,
    rows: moka::future::Cache<String, Arc<Vec<FileRecord>>>,
}

impl ResultCache {
    pub fn new(key: RowCacheKey) -> Self {
        Self {
            key,
            rows: moka::future::Cache::builder().build(),
        }
    }

    pub fn key_for(&self, row: &CatalogRow) -> String {
        match self.key {
            RowCacheKey::Title => row.title.clone(),
            RowCacheKey::AssetId => row.asset_id.clone(),
        }
    }

    pub async fn get(&self, row: &CatalogRow) -> Option<Arc<Vec<FileRecord>>> {
        self.rows.get(&self.key_for(row)).await
    }

    /// Cached records for `row`, or the result of `compute` stored under its key.
    ///
    /// Errors from `compute` are returned and nothing is cached.
    pub async fn get_or_compute<F, E>(
        &self,
        row: &CatalogRow,
        compute: F,
    ) -> Result<Arc<Vec<FileRecord>>, E>
    where
        F: Future<Output = Result<Vec<FileRecord>, E>>,
    {
        let key = self.key_for(row);
        if let Some(records) = self.rows.get(&key).await {
            return Ok(records);
        }

        let records = Arc::new(compute.await?);
        self.rows.insert(key, Arc::clone(&records)).await;
        Ok(records)
    }
}
