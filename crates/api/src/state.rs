//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::ApiConfig;
use crate::services::{CartService, CatalogService, ChatClient, ChatError, RetryPolicy};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the database pool, the services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: SqlitePool,
    catalog: CatalogService,
    cart: CartService,
    chat: Option<ChatClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `SQLite` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the chat client cannot be built from its
    /// configuration.
    pub fn new(config: ApiConfig, pool: SqlitePool) -> Result<Self, ChatError> {
        let catalog = CatalogService::new(pool.clone(), config.store.catalog_cache_ttl);
        let cart = CartService::new(
            pool.clone(),
            catalog.clone(),
            RetryPolicy::from(&config.store),
        );
        let chat = config.chat.as_ref().map(ChatClient::new).transpose()?;

        Ok(Self::from_parts(config, pool, catalog, cart, chat))
    }

    /// Assemble state from already-built services.
    #[must_use]
    pub fn from_parts(
        config: ApiConfig,
        pool: SqlitePool,
        catalog: CatalogService,
        cart: CartService,
        chat: Option<ChatClient>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                cart,
                chat,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the catalog service.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get the chat client, if a chat service is configured.
    #[must_use]
    pub fn chat(&self) -> Option<&ChatClient> {
        self.inner.chat.as_ref()
    }
}
