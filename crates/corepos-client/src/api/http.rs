//! # HTTP Client
//!
//! `reqwest` implementation of [`PosApi`].
//!
//! Every request carries `Authorization: Bearer <token>` and
//! `company: <id>` when those are known. Non-2xx responses are turned into
//! [`ApiError`] by [`ApiError::from_response`] before any caller sees them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corepos_core::invoice::{CompanySettings, HoldInvoiceRecord, InvoicePayload, InvoiceRecord};
use corepos_core::section::SectionInfo;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::{
    unwrap_list, unwrap_next_number, unwrap_record, ItemStatusChange, OrderQuery,
    OrderStatusChange, PosApi,
};
use crate::config::ApiSettings;
use crate::error::{ApiError, ApiResult, ErrorCode};

/// Header carrying the company id.
pub const COMPANY_HEADER: &str = "company";

/// Session credentials. Either may be missing before login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub company_id: Option<String>,
}

/// REST client for the core-pos backend.
#[derive(Debug, Clone)]
pub struct HttpPosApi {
    client: Client,
    base: Url,
    credentials: Arc<RwLock<Credentials>>,
}

impl HttpPosApi {
    pub fn new(base_url: &str, timeout: Duration, credentials: Credentials) -> ApiResult<Self> {
        let mut base = Url::parse(base_url)?;
        // `join` replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(HttpPosApi {
            client,
            base,
            credentials: Arc::new(RwLock::new(credentials)),
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> ApiResult<Self> {
        Self::new(
            &settings.base_url,
            Duration::from_secs(settings.timeout_secs),
            Credentials {
                token: settings.token.clone(),
                company_id: settings.company_id.clone(),
            },
        )
    }

    /// Replaces the session credentials, e.g. after login.
    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().await = credentials;
    }

    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for an endpoint path such as `v1/invoices/5`.
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<Value> {
        let url = self.endpoint(path)?;
        let credentials = self.credentials().await;

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = credentials.token.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(company) = credentials.company_id.as_deref() {
            request = request.header(COMPANY_HEADER, company);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "Request failed to send");
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, status = status.as_u16(), bytes = text.len(), "Response received");

        if !status.is_success() {
            let err = ApiError::from_response(status, &text);
            warn!(%method, path, status = status.as_u16(), code = %err.code, "Request rejected");
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            ApiError::new(ErrorCode::ApiError, format!("Unreadable response from {path}: {e}"))
        })
    }

    async fn get(&self, path: &str) -> ApiResult<Value> {
        self.send::<Value>(Method::GET, path, &[], None).await
    }

    async fn post<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> ApiResult<Value> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    async fn put<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> ApiResult<Value> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }
}

#[async_trait]
impl PosApi for HttpPosApi {
    async fn list_orders_by_section(&self, query: &OrderQuery) -> ApiResult<Vec<InvoiceRecord>> {
        unwrap_list(self.post("v1/core-pos/listordersbysection", query).await?)
    }

    async fn section_and_items(&self, invoice_id: i64) -> ApiResult<InvoiceRecord> {
        let body = serde_json::json!({ "invoice_id": invoice_id });
        unwrap_record(self.post("v1/core-pos/getsectionanditem", &body).await?)
    }

    async fn change_order_status(&self, change: &OrderStatusChange) -> ApiResult<()> {
        self.post("v1/core-pos/changeordestatus", change).await?;
        Ok(())
    }

    async fn change_item_status(&self, change: &ItemStatusChange) -> ApiResult<()> {
        self.post("v1/core-pos/changeOrderStatusItem", change).await?;
        Ok(())
    }

    async fn list_sections(&self) -> ApiResult<Vec<SectionInfo>> {
        unwrap_list(self.get("v1/core-pos/sections").await?)
    }

    async fn item_section(&self, item_id: i64) -> ApiResult<Option<SectionInfo>> {
        match self.get(&format!("v1/core-pos/sections/item/{item_id}")).await {
            Ok(Value::Null) => Ok(None),
            Ok(body) if body.get("data").is_some_and(Value::is_null) => Ok(None),
            Ok(body) => unwrap_record(body).map(Some),
            Err(e) if e.code == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn company_settings(&self) -> ApiResult<CompanySettings> {
        unwrap_record(self.get("v1/company/settings").await?)
    }

    async fn next_invoice_number(&self) -> ApiResult<String> {
        let body = self
            .send::<Value>(Method::GET, "v1/next-number", &[("key", "invoice")], None)
            .await?;
        unwrap_next_number(&body)
            .ok_or_else(|| ApiError::new(ErrorCode::ApiError, "Response carried no next number"))
    }

    async fn create_invoice(&self, payload: &InvoicePayload) -> ApiResult<InvoiceRecord> {
        unwrap_record(self.post("v1/invoices", payload).await?)
    }

    async fn get_invoice(&self, id: i64) -> ApiResult<InvoiceRecord> {
        unwrap_record(self.get(&format!("v1/invoices/{id}")).await?)
    }

    async fn update_invoice(&self, id: i64, changes: &Value) -> ApiResult<InvoiceRecord> {
        unwrap_record(self.put(&format!("v1/invoices/{id}"), changes).await?)
    }

    async fn list_hold_invoices(&self) -> ApiResult<Vec<HoldInvoiceRecord>> {
        unwrap_list(self.get("v1/hold-invoices").await?)
    }

    async fn get_hold_invoice(&self, id: i64) -> ApiResult<HoldInvoiceRecord> {
        unwrap_record(self.get(&format!("v1/hold-invoices/{id}")).await?)
    }

    async fn create_hold_invoice(&self, payload: &InvoicePayload) -> ApiResult<HoldInvoiceRecord> {
        unwrap_record(self.post("v1/hold-invoices", payload).await?)
    }

    async fn update_hold_invoice(
        &self,
        id: i64,
        payload: &InvoicePayload,
    ) -> ApiResult<HoldInvoiceRecord> {
        unwrap_record(self.put(&format!("v1/hold-invoices/{id}"), payload).await?)
    }

    async fn delete_hold_invoice(&self, id: i64) -> ApiResult<()> {
        self.send::<Value>(Method::DELETE, &format!("v1/hold-invoices/{id}"), &[], None)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpPosApi {
        HttpPosApi::new(base, Duration::from_secs(5), Credentials::default()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let api = api("https://pos.example.com/api");
        assert_eq!(
            api.endpoint("v1/invoices/5").unwrap().as_str(),
            "https://pos.example.com/api/v1/invoices/5"
        );
        assert_eq!(
            api.endpoint("/v1/core-pos/sections").unwrap().as_str(),
            "https://pos.example.com/api/v1/core-pos/sections"
        );

        let trailing = self::api("https://pos.example.com/api/");
        assert_eq!(trailing.base_url().as_str(), "https://pos.example.com/api/");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpPosApi::new("not a url", Duration::from_secs(1), Credentials::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_credentials_update() {
        let settings = ApiSettings {
            token: Some("old".into()),
            company_id: Some("7".into()),
            ..ApiSettings::default()
        };
        let api = HttpPosApi::from_settings(&settings).unwrap();
        assert_eq!(api.credentials().await.token.as_deref(), Some("old"));

        api.set_credentials(Credentials { token: Some("new".into()), company_id: None })
            .await;
        let creds = api.credentials().await;
        assert_eq!(creds.token.as_deref(), Some("new"));
        assert_eq!(creds.company_id, None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let api = HttpPosApi::new(
            "http://127.0.0.1:9/api",
            Duration::from_secs(2),
            Credentials::default(),
        )
        .unwrap();
        let err = api.company_settings().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.is_retryable());
    }
}
