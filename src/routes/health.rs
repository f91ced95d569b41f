use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "integrations": {
            "ledger": state.config.ledger_configured(),
            "generation": state.config.generation_configured(),
            "messaging": state.config.mail_configured(),
        }
    }))
}
