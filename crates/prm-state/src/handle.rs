//! SurrealDB connection configuration
//!
//! Supports in-memory, local file (`surrealkv://`), plain URL and
//! authenticated remote (WebSocket) connections.

use std::path::PathBuf;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::schema;

pub const DEFAULT_NAMESPACE: &str = "prmanager";
pub const DEFAULT_DATABASE: &str = "main";
pub const DEFAULT_LOCAL_PATH: &str = ".prmanager/db";

/// Configuration for an authenticated remote SurrealDB connection
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "prmanager")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl RemoteConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - PRM_SURREAL_ENDPOINT (required)
    /// - PRM_SURREAL_USERNAME (required)
    /// - PRM_SURREAL_PASSWORD (required)
    /// - PRM_SURREAL_NAMESPACE (optional, default: "prmanager")
    /// - PRM_SURREAL_DATABASE (optional, default: "main")
    /// - PRM_SURREAL_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("PRM_SURREAL_ENDPOINT").map_err(|_| "PRM_SURREAL_ENDPOINT not set")?;
        let username =
            std::env::var("PRM_SURREAL_USERNAME").map_err(|_| "PRM_SURREAL_USERNAME not set")?;
        let password =
            std::env::var("PRM_SURREAL_PASSWORD").map_err(|_| "PRM_SURREAL_PASSWORD not set")?;
        let namespace = std::env::var("PRM_SURREAL_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database = std::env::var("PRM_SURREAL_DATABASE")
            .unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("PRM_SURREAL_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Where the store lives
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Ephemeral `mem://` database
    Memory,
    /// `surrealkv://` files under the given directory
    Local(PathBuf),
    /// Any URL understood by `surrealdb::engine::any` (no authentication)
    Url(String),
    /// Authenticated remote endpoint
    Remote(RemoteConfig),
}

impl StoreConfig {
    /// Resolve from the environment.
    ///
    /// Remote credentials win, then `PRM_DB_URL`, then local persistence in
    /// `.prmanager/db`.
    pub fn from_env() -> Self {
        if let Ok(remote) = RemoteConfig::from_env() {
            return StoreConfig::Remote(remote);
        }
        if let Ok(url) = std::env::var("PRM_DB_URL") {
            return StoreConfig::Url(url);
        }
        StoreConfig::Local(PathBuf::from(DEFAULT_LOCAL_PATH))
    }

    /// Connect, select namespace/database and initialize the schema.
    #[instrument(skip_all)]
    pub async fn connect(&self) -> Result<Surreal<Any>, StateError> {
        let db = match self {
            StoreConfig::Memory => {
                info!("Connecting to SurrealDB (in-memory)");
                open(DEFAULT_NAMESPACE, DEFAULT_DATABASE, "mem://").await?
            }
            StoreConfig::Local(path) => {
                std::fs::create_dir_all(path).map_err(|e| {
                    StateError::StoragePath(format!("{}: {}", path.display(), e))
                })?;
                let url = format!("surrealkv://{}", path.display());
                info!("Connecting to SurrealDB ({})", url);
                open(DEFAULT_NAMESPACE, DEFAULT_DATABASE, &url).await?
            }
            StoreConfig::Url(url) => {
                info!("Connecting to SurrealDB ({})", url);
                open(DEFAULT_NAMESPACE, DEFAULT_DATABASE, url).await?
            }
            StoreConfig::Remote(config) => connect_remote(config).await?,
        };

        schema::init_schema(&db).await?;
        Ok(db)
    }
}

async fn open(namespace: &str, database: &str, url: &str) -> Result<Surreal<Any>, StateError> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns(namespace)
        .use_db(database)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    Ok(db)
}

#[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
async fn connect_remote(config: &RemoteConfig) -> Result<Surreal<Any>, StateError> {
    info!("Connecting to remote SurrealDB (root={})", config.is_root);

    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("Database authentication failed: {}", e)))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to select namespace/database: {}", e))
        })?;

    Ok(db)
}
