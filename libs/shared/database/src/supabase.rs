use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::store::{DataStore, Query, StoreError};

/// PostgREST data API client (Supabase `/rest/v1`), authenticated with the
/// service key.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, return_representation: bool) -> Result<HeaderMap, StoreError> {
        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|_| StoreError::Unauthorized("service key is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|_| StoreError::Unauthorized("service key is not a valid header value".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if return_representation {
            headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        }

        Ok(headers)
    }

    fn table_path(table: &str, query: &Query) -> String {
        let query_string = query.to_query_string();
        if query_string.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query_string)
        }
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>, return_representation: bool) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client
            .request(method, &url)
            .headers(self.get_headers(return_representation)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Data API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::CONFLICT => StoreError::UniqueViolation(error_text),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(error_text),
                _ => StoreError::Backend(format!("{}: {}", status, error_text)),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl DataStore for SupabaseClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.request(Method::GET, &Self::table_path(table, query), None, false).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let rows: Vec<Value> = self
            .request(Method::POST, &Self::table_path(table, &Query::new()), Some(row), true)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed(format!("insert into {} returned no rows", table)))
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
        self.request(Method::PATCH, &Self::table_path(table, query), Some(patch), true).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let removed: Vec<Value> = self
            .request(Method::DELETE, &Self::table_path(table, query), None, true)
            .await?;
        Ok(removed.len())
    }
}
