mod dialog;
mod error;
mod handlers;
mod normalize;
mod store;
mod twilio_types;
mod types;

use crate::store::UserStore;
use crate::types::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

pub mod consts {
    /// Path the dialog webhook is mounted at; Gather actions and no-input
    /// redirects point back here.
    pub const DIALOG_WEBHOOK_PATH: &str = "/twilio-twiml";
    pub const GATHER_TIMEOUT_SECS: u16 = 5;
    pub const GATHER_SPEECH_TIMEOUT_SECS: u16 = 2;
    /// Consecutive no-input redirects tolerated before giving up on the call.
    pub const MAX_SILENT_RETRIES: u32 = 3;
    pub const SAY_VOICE: &str = "alice";
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("voice_intake", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

    let app_state = Arc::new(AppState {
        store: UserStore::new(&data_dir),
    });

    let app = Router::new()
        .route(consts::DIALOG_WEBHOOK_PATH, post(handlers::dialog_webhook))
        .route("/twilio-webhook", post(handlers::studio_webhook))
        .route("/user-data", post(handlers::user_data))
        .route(
            "/users",
            get(handlers::users_list).delete(handlers::users_delete),
        )
        .route("/users/:id", get(handlers::users_get))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::root))
        .with_state(app_state);

    tracing::info!(port, "voice intake server starting");
    axum::Server::bind(&format!("0.0.0.0:{port}").parse().unwrap())
        .serve(app.into_make_service())
        .await
        .unwrap();
}
