//! # Register Wiring
//!
//! [`PosClient`] owns the shared pieces of one register process and hands
//! out per-window services.
//!
//! ```text
//! PosClient
//!   ├── Database ─► SharedStorage ──┬─► window() ─────► StorageHandle
//!   │                               ├─► cart_sync() ──► CartSyncService
//!   ├── ChannelHub ─────────────────┘   event_bus() ──► EventBus
//!   ├── PosApi (HttpPosApi) ──────────► hold_orders() ► HoldOrderService
//!   └── SectionCache ─────────────────► kitchen() ────► KitchenService
//! ```

use std::sync::Arc;

use corepos_core::types::SectionType;
use corepos_store::{keys, Database, DbConfig};
use corepos_sync::{CartSyncService, ChannelHub, EventBus, SharedStorage, StorageHandle};
use tracing::info;

use crate::api::http::{Credentials, HttpPosApi};
use crate::api::PosApi;
use crate::config::PosConfig;
use crate::error::{ApiError, ApiResult};
use crate::hold::HoldOrderService;
use crate::kitchen::{KitchenService, OrderScope};
use crate::section_cache::SectionCache;

pub struct PosClient {
    config: PosConfig,
    db: Database,
    storage: SharedStorage,
    hub: ChannelHub,
    api: Arc<dyn PosApi>,
    /// Present when `api` is the HTTP client, for credential updates.
    http: Option<HttpPosApi>,
    sections: SectionCache,
}

impl std::fmt::Debug for PosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosClient")
            .field("base_url", &self.config.api.base_url)
            .field("database", &self.config.database_path())
            .finish()
    }
}

impl PosClient {
    /// Opens local storage and builds the HTTP client.
    ///
    /// Credentials missing from the config are taken from the session
    /// stored by a previous login.
    pub async fn connect(config: PosConfig) -> ApiResult<Self> {
        config.validate()?;
        let db = Database::new(DbConfig::new(config.database_path())).await?;
        let storage = SharedStorage::with_capacity(db.local_storage(), config.sync.event_capacity);

        let window = storage.open_window();
        let credentials = Credentials {
            token: match config.api.token.clone() {
                Some(token) => Some(token),
                None => window.get(keys::TOKEN).await?,
            },
            company_id: match config.api.company_id.clone() {
                Some(company) => Some(company),
                None => window.get(keys::COMPANY_ID).await?,
            },
        };
        let http = HttpPosApi::new(&config.api.base_url, config.request_timeout(), credentials)?;

        info!(
            base_url = %http.base_url(),
            database = %config.database_path().display(),
            "Register client ready"
        );

        Ok(Self::assemble(config, db, storage, Arc::new(http.clone()), Some(http)))
    }

    /// Builds a client over an existing database and API.
    pub fn with_api(config: PosConfig, db: Database, api: Arc<dyn PosApi>) -> Self {
        let storage = SharedStorage::with_capacity(db.local_storage(), config.sync.event_capacity);
        Self::assemble(config, db, storage, api, None)
    }

    fn assemble(
        config: PosConfig,
        db: Database,
        storage: SharedStorage,
        api: Arc<dyn PosApi>,
        http: Option<HttpPosApi>,
    ) -> Self {
        let sections = SectionCache::new(&config.kitchen);
        PosClient {
            config,
            db,
            storage,
            hub: ChannelHub::new(),
            api,
            http,
            sections,
        }
    }

    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn PosApi> {
        Arc::clone(&self.api)
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    /// A new window onto the shared storage.
    pub fn window(&self) -> StorageHandle {
        self.storage.open_window()
    }

    pub fn cart_sync(&self) -> CartSyncService {
        CartSyncService::with_channel(self.window(), self.hub.clone(), &self.config.sync.cart_channel)
    }

    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.window())
    }

    pub fn hold_orders(&self) -> HoldOrderService {
        HoldOrderService::new(self.api(), self.window())
    }

    /// Board service for one section. Must be called inside a Tokio runtime.
    pub fn kitchen(&self, section: SectionType, scope: OrderScope) -> KitchenService {
        KitchenService::new(
            self.api(),
            self.sections.clone(),
            self.window(),
            section,
            scope,
            &self.config.kitchen,
            self.config.retry.clone(),
        )
    }

    /// Stores the session and applies it to the HTTP client.
    pub async fn login(&self, token: &str, company_id: &str) -> ApiResult<()> {
        if token.trim().is_empty() {
            return Err(ApiError::validation("token is required"));
        }
        let window = self.window();
        window.set(keys::TOKEN, token).await?;
        window.set(keys::COMPANY_ID, company_id).await?;

        if let Some(http) = &self.http {
            http.set_credentials(Credentials {
                token: Some(token.to_string()),
                company_id: Some(company_id.to_string()).filter(|c| !c.is_empty()),
            })
            .await;
        }
        info!(company_id, "Session stored");
        Ok(())
    }

    /// Clears every session key, including the cart, and drops credentials.
    ///
    /// Order history and pending reconciliations are kept.
    pub async fn logout(&self) -> ApiResult<()> {
        let window = self.window();
        let mut removed = 0;
        for key in keys::SESSION_KEYS {
            if window.remove(key).await? {
                removed += 1;
            }
        }
        if let Some(http) = &self.http {
            http.set_credentials(Credentials::default()).await;
        }
        self.sections.invalidate_all();
        info!(removed, "Session cleared");
        Ok(())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakePosApi;
    use corepos_core::cart::{CartState, ProductInput};
    use corepos_sync::CartMessage;
    use std::time::Duration;

    async fn client() -> PosClient {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        PosClient::with_api(PosConfig::default(), db, Arc::new(FakePosApi::new()))
    }

    #[tokio::test]
    async fn test_cart_reaches_other_window() {
        let client = client().await;
        let cashier = client.cart_sync();
        let display = client.cart_sync();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = display.subscribe(move |msg| {
            let _ = tx.send(msg);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut cart = CartState::new();
        cart.add_item(&ProductInput::new(1, "Latte", 450i64), 2).unwrap();
        cashier.save_cart_state(&cart).await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        match msg {
            CartMessage::Updated(snapshot) => assert_eq!(snapshot.total.cents(), 900),
            other => panic!("unexpected message: {other:?}"),
        }

        let mut restored = CartState::new();
        assert!(display.restore_into(&mut restored).await.unwrap());
        assert_eq!(restored.total().cents(), 900);
    }

    #[tokio::test]
    async fn test_logout_clears_session_keys_only() {
        let client = client().await;
        client.login("tok", "7").await.unwrap();

        let window = client.window();
        window.set(keys::ORDER_HISTORY, "[]").await.unwrap();
        window.set(keys::CURRENT_CART_STATE, "{}").await.unwrap();

        client.logout().await.unwrap();

        assert_eq!(window.get(keys::TOKEN).await.unwrap(), None);
        assert_eq!(window.get(keys::CURRENT_CART_STATE).await.unwrap(), None);
        assert_eq!(window.get(keys::ORDER_HISTORY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_login_requires_token() {
        let client = client().await;
        let err = client.login(" ", "7").await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_connect_reads_stored_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PosConfig::default();
        config.storage.db_path = Some(dir.path().join("register.db"));

        let first = PosClient::connect(config.clone()).await.unwrap();
        first.login("stored-token", "42").await.unwrap();
        first.close().await;

        let second = PosClient::connect(config).await.unwrap();
        let creds = second.http.as_ref().unwrap().credentials().await;
        assert_eq!(creds.token.as_deref(), Some("stored-token"));
        assert_eq!(creds.company_id.as_deref(), Some("42"));
        second.close().await;
    }
}
