//! akari server: wires the stores, federation engine, and HTTP surface.

use akari_common::{Config, IdGenerator};
use akari_federation::client::ApClient;
use akari_federation::delivery::{Deliverer, DeliveryService, HttpDeliverer};
use akari_federation::dispatcher::Dispatcher;
use akari_federation::handler::inbox::{InboxState, inbox_handler, user_inbox_handler};
use akari_federation::handlers::HandlerContext;
use akari_federation::ledger::IdempotencyLedger;
use akari_federation::resolver::{ActorResolver, RemoteActorResolver};
use akari_store::memory::{
    MemoryFollowStore, MemoryNoteStore, MemoryReactionStore, MemoryUserStore,
};
use akari_store::{FollowStore, NoteStore, ReactionStore, UserStore};
use anyhow::Context;
use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,akari_federation=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    info!(
        instance = %config.federation.instance_name,
        url = %config.server.url,
        federation_enabled = config.federation.enabled,
        "Starting akari"
    );

    let state = build_state(&config)?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down cleanly");
    Ok(())
}

fn build_state(config: &Config) -> anyhow::Result<InboxState> {
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let follows: Arc<dyn FollowStore> = Arc::new(MemoryFollowStore::new());
    let notes: Arc<dyn NoteStore> = Arc::new(MemoryNoteStore::new());
    let reactions: Arc<dyn ReactionStore> = Arc::new(MemoryReactionStore::new());

    let host = config
        .server
        .url
        .strip_prefix("https://")
        .or_else(|| config.server.url.strip_prefix("http://"))
        .unwrap_or(&config.server.url);
    let client = Arc::new(
        ApClient::new(host, config.federation.delivery_timeout_secs)
            .context("failed to build HTTP client")?,
    );

    let resolver: Arc<dyn ActorResolver> =
        Arc::new(RemoteActorResolver::new(users.clone(), client.clone()));
    let deliverer: Arc<dyn Deliverer> = Arc::new(HttpDeliverer::new(client));
    let delivery = Arc::new(DeliveryService::new(deliverer, config.server.url.clone()));

    let ctx = HandlerContext {
        users,
        follows,
        notes,
        reactions,
        resolver,
        delivery,
        base_url: config.server.url.clone(),
        id_gen: IdGenerator::new(),
    };

    let dispatcher = Dispatcher::new(
        ctx,
        IdempotencyLedger::new(config.federation.ledger_retention_secs),
        config.federation.signature_max_age_secs,
    );

    Ok(InboxState {
        dispatcher: Arc::new(dispatcher),
    })
}

fn build_router(state: InboxState) -> Router {
    Router::new()
        .route("/inbox", post(inbox_handler))
        .route("/users/{username}/inbox", post(user_inbox_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
