//! Restaurant directory backend.
//!
//! Stores restaurants, their cuisines and reviews in Redis, keeps a live
//! average-rating ranking, and caches weather lookups per restaurant.
//!
//!
//!
//! # Layout
//! - [`keys`]: every Redis key, one namespace
//! - [`store`]: the command set the directory needs, [`database`] for Redis, [`memory`] in-process
//! - [`guards`]: existence checks run before any id-targeted operation
//! - [`restaurants`], [`reviews`], [`cuisines`]: the data model and rating aggregation
//! - [`weather`]: cache-aside lookup in front of the weather provider
//! - [`routes`]: HTTP handlers, wrapping results in `{ success, message, data }`
//!
//!
//!
//! # Notes
//!
//! ## No transactions
//! Creating a restaurant or adding a review issues several Redis commands at
//! once. Each command is atomic, the group is not. A failure part way leaves
//! the writes that landed in place; the request still reports the failure.
//!
//! ## Views are approximate
//! Reading a restaurant increments its view counter in parallel with the read,
//! so the returned count may or may not include that read.
//!
//!
//!
//! # Setup
//!
//! Redis Stack (for `JSON.*`) on the default port.
//! ```sh
//! docker run -p 6379:6379 redis/redis-stack-server
//! ```
//!
//! Run against it.
//! ```sh
//! RUST_LOG=info WEATHER_API_KEY=... cargo run
//! ```
//!
//! Run without Redis.
//! ```sh
//! REDIS_URL=memory:// cargo run
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod cuisines;
pub mod database;
pub mod error;
pub mod guards;
pub mod ids;
pub mod keys;
pub mod memory;
pub mod models;
pub mod response;
pub mod restaurants;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
pub mod weather;

use config::Config;
use routes::{
    add_review_handler, create_restaurant_handler, cuisine_handler, get_details_handler,
    get_restaurant_handler, get_review_handler, list_cuisines_handler, list_restaurants_handler,
    list_reviews_handler, method_not_allowed_handler, not_found_handler, remove_review_handler,
    set_details_handler, weather_handler,
};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/restaurants",
            get(list_restaurants_handler).post(create_restaurant_handler),
        )
        .route("/restaurants/{restaurant_id}", get(get_restaurant_handler))
        .route(
            "/restaurants/{restaurant_id}/details",
            get(get_details_handler).post(set_details_handler),
        )
        .route("/restaurants/{restaurant_id}/weather", get(weather_handler))
        .route(
            "/restaurants/{restaurant_id}/reviews",
            get(list_reviews_handler).post(add_review_handler),
        )
        .route(
            "/restaurants/{restaurant_id}/reviews/{review_id}",
            get(get_review_handler).delete(remove_review_handler),
        )
        .route("/cuisines", get(list_cuisines_handler))
        .route("/cuisines/{cuisine}", get(cuisine_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new(Config::load()?)?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.store.close().await;
    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
