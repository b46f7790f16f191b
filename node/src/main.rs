// Path: node/src/main.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Garl Node
//!
//! The binary that makes the core runnable: loads [`EngineConfig`] and a
//! handful of process-level settings from the environment, wires storage,
//! signing, the engine, and the webhook dispatcher together, and serves the
//! minimal surface this workspace owns — discovery, health, and metrics.
//! The full intake/query REST API is the out-of-scope HTTP adapter; it is
//! not built here.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use garl_crypto::SigningKey;
use garl_storage::Storage;
use garl_telemetry::init::LogFormat;
use garl_types::config::EngineConfig;
use garl_types::error::GarlError;

/// Process-level settings this binary reads from the environment. Everything
/// below `EngineConfig` itself (signing key material, storage backend
/// selection, bind addresses, log format) lives here rather than in the
/// engine's own config record, since the engine never touches the
/// environment directly.
#[derive(Parser, Debug)]
#[command(name = "garl-node", about = "Runs the Garl reputation oracle core")]
struct Args {
    /// 32-byte hex-encoded secp256k1 scalar. Generated in memory (and
    /// warned about) if unset.
    #[arg(long, env = "SIGNING_PRIVATE_KEY_HEX")]
    signing_private_key_hex: Option<String>,

    /// `memory` (default, zero-configuration) or `redb` (durable, file-backed).
    #[arg(long, env = "GARL_STORAGE_BACKEND", default_value = "memory")]
    storage_backend: String,

    /// Path to the `redb` database file, required when `storage_backend = redb`.
    #[arg(long, env = "GARL_REDB_PATH")]
    redb_path: Option<PathBuf>,

    /// Path an ephemerally-generated signing key is persisted to, and loaded
    /// back from on a later restart. Without this, an unset
    /// `SIGNING_PRIVATE_KEY_HEX` means a fresh key every run, and every
    /// certificate issued by the previous run stops verifying.
    #[arg(long, env = "GARL_SIGNING_KEY_PATH")]
    signing_key_path: Option<PathBuf>,

    /// Address the discovery endpoint binds to.
    #[arg(long, env = "GARL_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Address the `/healthz`, `/readyz`, `/metrics` endpoints bind to.
    #[arg(long, env = "GARL_METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,
}

/// Shared state for the discovery route.
#[derive(Clone)]
struct DiscoveryState {
    public_key_hex: String,
    instance_name: &'static str,
}

async fn agent_card(State(state): State<DiscoveryState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "@context": "https://garl.dev/contexts/v1",
        "name": state.instance_name,
        "signing": {
            "alg": "ECDSA-secp256k1",
            "public_key": state.public_key_hex,
        },
    }))
}

/// Loads the signing key, persisting a freshly generated one to `key_path` so
/// a future restart loads the same key instead of minting a new one (without
/// this, every certificate issued by the previous run stops verifying the
/// moment the process restarts).
fn load_signing_key(hex_key: Option<&str>, key_path: Option<&PathBuf>) -> Result<SigningKey, GarlError> {
    if let Some(hex_key) = hex_key {
        return SigningKey::from_hex(hex_key).map_err(|e| {
            GarlError::Config(format!(
                "SIGNING_PRIVATE_KEY_HEX did not decode to a valid secp256k1 key: {e}"
            ))
        });
    }

    if let Some(path) = key_path {
        if path.exists() {
            let hex = std::fs::read_to_string(path).map_err(|e| {
                GarlError::Config(format!(
                    "failed to read the signing key at {}: {e}",
                    path.display()
                ))
            })?;
            return SigningKey::from_hex(hex.trim()).map_err(|e| {
                GarlError::Config(format!(
                    "the signing key at {} did not decode to a valid secp256k1 key: {e}",
                    path.display()
                ))
            });
        }
    }

    tracing::warn!("no signing key on disk; generating a new one for this process");
    let key = SigningKey::generate();
    match key_path {
        Some(path) => {
            std::fs::write(path, key.to_hex()).map_err(|e| {
                GarlError::Config(format!(
                    "failed to persist the generated signing key to {}: {e}",
                    path.display()
                ))
            })?;
            tracing::info!(path = %path.display(), "persisted the generated signing key");
        }
        None => tracing::warn!(
            "--signing-key-path unset; this key will not survive a restart and certificates \
             issued this run will not verify against a future restart's key"
        ),
    }
    Ok(key)
}

fn build_storage(args: &Args) -> Result<Arc<dyn Storage>, GarlError> {
    match args.storage_backend.as_str() {
        "memory" => Ok(Arc::new(garl_storage::InMemoryStorage::new())),
        "redb" => {
            let path = args.redb_path.as_ref().ok_or_else(|| {
                GarlError::Config("GARL_REDB_PATH is required when GARL_STORAGE_BACKEND=redb".into())
            })?;
            let store = garl_storage::RedbStorage::open(path).map_err(|e| {
                GarlError::Config(format!("failed to open the redb store at {}: {e}", path.display()))
            })?;
            Ok(Arc::new(store))
        }
        other => Err(GarlError::Config(format!(
            "unknown GARL_STORAGE_BACKEND: {other} (expected memory or redb)"
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    garl_telemetry::init::init_tracing(LogFormat::from_env())
        .context("failed to initialize the tracing subscriber")?;

    garl_telemetry::prometheus::install().context("failed to install the Prometheus metrics sink")?;

    let engine_config = Arc::new(EngineConfig::default());
    let signing_key = Arc::new(
        load_signing_key(args.signing_private_key_hex.as_deref(), args.signing_key_path.as_ref())
            .map_err(anyhow::Error::from)?,
    );
    let storage = build_storage(&args).map_err(anyhow::Error::from)?;
    let (webhook_handle, webhook_join) =
        garl_webhook::Dispatcher::spawn(Arc::clone(&storage), engine_config.webhook.clone());
    // Held only so this binary constructs and owns the full stack end to
    // end; the (out-of-scope) HTTP adapter is what would bind intake routes
    // to a pipeline like this one.
    let _pipeline = garl_engine::Pipeline::new(
        Arc::clone(&storage),
        Arc::clone(&signing_key),
        Arc::clone(&engine_config),
        webhook_handle,
    );

    tracing::info!(
        storage_backend = %args.storage_backend,
        http_addr = %args.http_addr,
        metrics_addr = %args.metrics_addr,
        "garl-node starting"
    );

    let discovery_state = DiscoveryState {
        public_key_hex: signing_key.public_key_hex(),
        instance_name: "garl-reputation-oracle",
    };
    let discovery_app = Router::new()
        .route("/.well-known/agent-card.json", get(agent_card))
        .with_state(discovery_state);

    let discovery_listener = tokio::net::TcpListener::bind(args.http_addr)
        .await
        .with_context(|| format!("failed to bind discovery listener on {}", args.http_addr))?;

    let discovery_server = axum::serve(discovery_listener, discovery_app.into_make_service());
    let metrics_server = garl_telemetry::http::run_server(args.metrics_addr);

    tokio::select! {
        result = discovery_server => {
            if let Err(err) = result {
                tracing::error!(error = %err, "discovery server exited with an error");
            }
        }
        _ = metrics_server => {}
    }

    drop(webhook_join);
    Ok(())
}
