//! Integration tests for Shopkeep.
//!
//! Each test starts the full API (routes, middleware, services) on an
//! ephemeral port, backed by a fresh `SQLite` file in a temporary directory
//! seeded with [`CATALOG`]. Tests talk to it over real HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopkeep-integration-tests
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use reqwest::Client;
use secrecy::SecretString;
use sqlx::SqlitePool;
use tempfile::TempDir;
use url::Url;

use shopkeep_api::config::{ApiConfig, ChatConfig, LogFormat, StoreConfig};
use shopkeep_api::db;
use shopkeep_api::routes;
use shopkeep_api::services::{CartService, CatalogService, ChatClient, RetryPolicy, SeedFile};
use shopkeep_api::state::AppState;

/// Catalog every test starts with.
pub const CATALOG: &str = r#"
products:
  - { id: 1, name: Wireless Headphones, price: "19.99", category: Electronics, emoji: "🎧",
      description: Over-ear Bluetooth headphones }
  - { id: 2, name: Wool Socks, price: "5.00", category: Clothing, emoji: "🧦",
      description: Merino hiking socks }
  - { id: 3, name: Camping Tent, price: "100.00", category: Outdoors, emoji: "⛺",
      description: Two-person dome tent }
  - { id: 4, name: Portable Charger, price: "29.95", category: Electronics, emoji: "🔋",
      description: USB-C power bank }
"#;

/// A running API instance.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub pool: SqlitePool,
    _db_dir: TempDir,
}

impl TestContext {
    /// Start the API without a chat service.
    ///
    /// # Panics
    ///
    /// Panics if the database or the server cannot be set up.
    pub async fn new() -> Self {
        Self::start(None).await
    }

    /// Start the API with chat turns forwarded to `chat_base_url`.
    ///
    /// Retries back off quickly so failure tests stay fast.
    ///
    /// # Panics
    ///
    /// Panics if the database or the server cannot be set up.
    pub async fn with_chat(chat_base_url: &str, max_retries: u32) -> Self {
        let config = ChatConfig {
            base_url: Url::parse(chat_base_url).expect("valid chat URL"),
            api_key: None,
            timeout: Duration::from_secs(5),
            max_retries,
        };
        let client = ChatClient::new(&config)
            .expect("build chat client")
            .with_initial_backoff(Duration::from_millis(10));
        Self::start(Some((config, client))).await
    }

    async fn start(chat: Option<(ChatConfig, ChatClient)>) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = db_dir.path().join("shopkeep.db");
        let database_url = SecretString::from(format!("sqlite://{}", db_path.display()));

        let store = StoreConfig {
            retry_backoff: Duration::from_millis(5),
            ..StoreConfig::default()
        };

        let pool = db::create_pool(&database_url, store.timeout)
            .await
            .expect("create pool");
        db::run_migrations(&pool).await.expect("run migrations");

        let catalog = CatalogService::new(pool.clone(), store.catalog_cache_ttl);
        let seed = SeedFile::parse(CATALOG).expect("parse catalog");
        catalog.seed(&seed).await.expect("seed catalog");

        let cart = CartService::new(pool.clone(), catalog.clone(), RetryPolicy::from(&store));
        let (chat_config, chat_client) = chat.unzip();

        let config = ApiConfig {
            database_url,
            host: [127, 0, 0, 1].into(),
            port: 0,
            cors_origin: None,
            auto_migrate: false,
            store,
            chat: chat_config,
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let state = AppState::from_parts(config, pool.clone(), catalog, cart, chat_client);
        let addr = serve(routes::app(state)).await;

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            pool,
            _db_dir: db_dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Serve `router` on an ephemeral local port.
///
/// # Panics
///
/// Panics if no local port can be bound.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move { axum::serve(listener, router).await });
    addr
}
