//! ServerBuilder for fluent API to build HTTP servers

use super::router::common_route;
use crate::config::{ServiceConfig, check_route_path, normalize_route_path};
use crate::core::{CommonController, ControllerHooks, DocumentStore, ErrorMode, FilterBuilder};
use crate::storage::MongoStore;
use anyhow::{Result, bail};
use axum::routing::get;
use axum::{Json, Router};
use mongodb::Database;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// A collection waiting to be mounted
struct Mount {
    path: String,
    store: Arc<dyn DocumentStore>,
    hooks: Option<Arc<dyn ControllerHooks>>,
}

/// Builder for creating HTTP servers with one controller per collection
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .mount("/items", InMemoryStore::new("items"))
///     .build()?;
/// ```
pub struct ServerBuilder {
    error_mode: ErrorMode,
    reserved_keys: Option<Vec<String>>,
    config: Option<ServiceConfig>,
    mounts: Vec<Mount>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            error_mode: ErrorMode::default(),
            reserved_keys: None,
            config: None,
            mounts: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Take the error mode and reserved keys from a service configuration
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.error_mode = config.error_mode;
        self.reserved_keys = Some(config.reserved_keys());
        self.config = Some(config);
        self
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Mount a controller with pass-through hooks over `store`
    pub fn mount(self, path: impl Into<String>, store: impl DocumentStore + 'static) -> Self {
        self.push_mount(path.into(), Arc::new(store), None)
    }

    /// Mount a controller over `store` whose hook points are overridden
    pub fn mount_with_hooks(
        self,
        path: impl Into<String>,
        store: impl DocumentStore + 'static,
        hooks: impl ControllerHooks + 'static,
    ) -> Self {
        self.push_mount(path.into(), Arc::new(store), Some(Arc::new(hooks)))
    }

    /// Mount every configured route over its collection in `database`
    ///
    /// Requires [`with_config`](Self::with_config) to have been called first.
    pub fn mount_routes(mut self, database: &Database) -> Result<Self> {
        let Some(config) = self.config.clone() else {
            bail!("No configuration loaded. Call .with_config() first");
        };
        for route in &config.routes {
            let store = MongoStore::from_database(database, &route.collection);
            self = self.push_mount(route.path.clone(), Arc::new(store), None);
        }
        Ok(self)
    }

    fn push_mount(
        mut self,
        path: String,
        store: Arc<dyn DocumentStore>,
        hooks: Option<Arc<dyn ControllerHooks>>,
    ) -> Self {
        self.mounts.push(Mount { path, store, hooks });
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for endpoints that don't follow the collection pattern,
    /// such as authentication or webhooks.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let auth_routes = Router::new().route("/login", post(login_handler));
    ///
    /// ServerBuilder::new()
    ///     .mount("/items", store)
    ///     .with_custom_routes(auth_routes)
    ///     .build()?;
    /// ```
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the final router
    ///
    /// Fails when a mount path is a health route, contains route syntax,
    /// or is mounted twice (trailing slashes ignored).
    ///
    /// This generates:
    /// - Health check routes (`/health`, `/healthz`)
    /// - The verb routes of every mounted collection
    /// - Custom routes
    pub fn build(self) -> Result<Router> {
        let filter_builder = match &self.reserved_keys {
            Some(keys) => FilterBuilder::with_reserved_keys(keys.iter().cloned()),
            None => FilterBuilder::new(),
        };

        let mut app = health_routes();
        let mut seen = HashSet::new();
        for mount in self.mounts {
            check_route_path(&mount.path)?;
            if !seen.insert(normalize_route_path(&mount.path).to_string()) {
                bail!("Path '{}' is mounted twice", mount.path);
            }

            let mut controller =
                CommonController::new(mount.store).with_filter_builder(filter_builder.clone());
            if let Some(hooks) = mount.hooks {
                controller = controller.with_hooks(hooks);
            }
            app = common_route(app, &mount.path, controller, self.error_mode);
        }

        for custom_router in self.custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    ///
    /// # Example
    ///
    /// ```ignore
    /// ServerBuilder::new()
    ///     .mount("/items", store)
    ///     .serve("127.0.0.1:3000").await?;
    /// ```
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "common-route"
    }))
}

/// Wait for a shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
