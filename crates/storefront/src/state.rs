//! Application state shared across handlers.

use std::sync::Arc;

use loomwear_core::payment::PaymentSimulator;
use sqlx::PgPool;
use tower_sessions::Session;

use crate::config::StorefrontConfig;
use crate::services::{CartService, CatalogService, CheckoutService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: CatalogService,
    payments: PaymentSimulator,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let catalog = CatalogService::new(pool.clone(), config.catalog_cache_ttl);
        let payments = PaymentSimulator::new(config.payment_settle_after);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                payments,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached catalog reads.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Cart operations for the request that owns `session`.
    #[must_use]
    pub fn cart<'a>(&'a self, session: &'a Session) -> CartService<'a> {
        CartService::new(&self.inner.pool, session)
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.inner.pool, &self.inner.catalog, self.inner.payments)
    }
}
