//! Items API: a MongoDB collection exposed through the common controller
//!
//! ```sh
//! COMMON_ROUTE_CONFIG=demos/items_api/config.yaml cargo run --example items_api
//! curl 'localhost:3000/items?status=active&__limit=2&price__json=%7B%22%24gt%22%3A10%7D'
//! ```
//!
//! Without a configuration file the demo serves `/items` from
//! `mongodb://localhost:27017`. Set `COMMON_ROUTE_IN_MEMORY=1` to skip MongoDB.

use common_route::prelude::*;
use mongodb::Client;
use tracing_subscriber::EnvFilter;

/// Redacts prices from list responses
struct PublicCatalog;

#[async_trait]
impl ControllerHooks for PublicCatalog {
    async fn verb_get(&self, mut models: Vec<Document>) -> ControllerResult<Vec<Document>> {
        for model in &mut models {
            model.remove("cost");
        }
        Ok(models)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("common_route=debug,tower_http=debug")),
        )
        .init();

    let config = match std::env::var("COMMON_ROUTE_CONFIG") {
        Ok(path) => ServiceConfig::from_yaml_file(&path)?,
        Err(_) => ServiceConfig::default_config(),
    };
    let addr = config.server.addr.clone();

    let builder = ServerBuilder::new().with_config(config.clone());

    let builder = if std::env::var("COMMON_ROUTE_IN_MEMORY").is_ok() {
        tracing::info!("Serving from an in-memory store");
        config.routes.iter().fold(builder, |builder, route| {
            builder.mount(route.path.clone(), InMemoryStore::new(route.collection.clone()))
        })
    } else {
        let mongo = config
            .mongodb
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("mongodb settings are required"))?;
        let client = Client::with_uri_str(&mongo.uri).await?;
        let database = client.database(&mongo.database);
        tracing::info!(database = %mongo.database, "Connected to MongoDB");

        builder
            .mount_with_hooks(
                "/catalog",
                MongoStore::from_database(&database, "items"),
                PublicCatalog,
            )
            .mount_routes(&database)?
    };

    builder.serve(&addr).await
}
