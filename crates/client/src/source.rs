use async_trait::async_trait;
use serde_json::Value;

use charfeed_core::character::Rating;
use charfeed_core::ports::{CatalogRequest, CatalogSource, FetchOutcome};
use charfeed_core::types::NumericId;

use crate::api::CatalogApi;
use crate::config::PHOTO_MAP_PATHS;

#[async_trait]
impl CatalogSource for CatalogApi {
    async fn fetch_catalog(&self, request: CatalogRequest) -> FetchOutcome {
        CatalogApi::fetch_catalog(self, request).await
    }

    async fn fetch_supplementary_photos(&self) -> Vec<Value> {
        let mut documents = Vec::with_capacity(PHOTO_MAP_PATHS.len());
        for path in PHOTO_MAP_PATHS {
            match self.fetch_photo_document(path).await {
                Ok(document) => documents.push(document),
                Err(e) => tracing::debug!(path, error = %e, "Photo map unavailable"),
            }
        }
        documents
    }

    async fn fetch_rating(&self, id: NumericId) -> Option<Rating> {
        match CatalogApi::fetch_rating(self, id).await {
            Ok(rating) => Some(rating),
            Err(e) => {
                tracing::debug!(character_id = id, error = %e, "Rating unavailable");
                None
            }
        }
    }
}
