use crate::dialog::{apology, step, CallMeta, DialogState, FieldKind};
use crate::error::AppError;
use crate::store::CompletedRecord;
use crate::twilio_types::wrap_twiml;
use crate::types::AppState;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, error, info, trace};

fn xml_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/xml".parse().unwrap());
    headers
}

fn parse_form(body: &str) -> Result<HashMap<String, String>, AppError> {
    serde_urlencoded::from_str(body).map_err(|e| {
        error!(error=%e, "failed to parse form-encoded body");
        AppError("failed to parse form-encoded body")
    })
}

/// The dialog webhook.  Every turn of every call lands here; whatever goes
/// wrong, the platform must get back playable TwiML that ends the call.
pub async fn dialog_webhook(
    State(app_state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: String,
) -> impl IntoResponse {
    trace!(body=%body, query=?query, "dialog webhook turn");
    let twiml = match dialog_turn(&app_state, query.as_deref(), &body) {
        Ok(twiml) => twiml,
        Err(e) => {
            error!(error=%e, "turn processing failed, sending apology");
            wrap_twiml(xmlserde::xml_serialize(apology()))
        }
    };
    (StatusCode::OK, xml_headers(), twiml)
}

fn dialog_turn(
    app_state: &Arc<AppState>,
    query: Option<&str>,
    body: &str,
) -> Result<String, AppError> {
    let form = parse_form(body)?;
    let carried: HashMap<String, String> = query
        .map(parse_form)
        .transpose()?
        .unwrap_or_default();
    let retries = carried
        .get("retry")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let meta = CallMeta::from_params(&form);
    let prior = DialogState::from_carried(&carried, meta.call_sid.clone());
    let raw_name = FieldKind::Name.extract(&form);
    let raw_job = FieldKind::Job.extract(&form);

    let outcome = step(prior, &raw_name, &raw_job, retries, &meta);

    // Fire and forget: the response never waits on the write, and a failed
    // write never changes what the caller hears.
    if let Some(record) = outcome.record {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            if let Err(e) = app_state.store.append(record).await {
                error!(error=%e, "failed to persist completed record");
            }
        });
    }

    Ok(wrap_twiml(xmlserde::xml_serialize(outcome.response)))
}

/// Single-shot Studio webhook: no dialog, just store whatever fields arrived.
pub async fn studio_webhook(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    trace!(body=%body, "studio webhook payload");
    let form = match parse_form(&body) {
        Ok(form) => form,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": e.to_string() })),
            );
        }
    };

    let meta = CallMeta::from_params(&form);
    let name = FieldKind::Name.extract(&form);
    let job = FieldKind::Job.extract(&form);
    if name.is_empty() && job.is_empty() {
        debug!("studio webhook carried neither name nor job");
    }

    let record = CompletedRecord::new(name, job, &meta);
    let summary = json!({
        "name": record.name.clone(),
        "job": record.job.clone(),
        "phone": record.phone.clone(),
        "timestamp": record.timestamp.clone(),
    });
    if !record.name.is_empty() || !record.job.is_empty() {
        if let Err(e) = app_state.store.append(record).await {
            error!(error=%e, "failed to persist studio webhook record");
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "User data received and processed successfully",
            "data": summary,
        })),
    )
}

#[derive(Deserialize)]
pub struct UserDataPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "currentJob")]
    pub job: String,
    #[serde(default)]
    pub phone: String,
}

/// Direct intake endpoint for testing and non-voice integrations.  Unlike the
/// webhooks, this one rejects incomplete payloads.
pub async fn user_data(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UserDataPayload>,
) -> impl IntoResponse {
    if payload.name.is_empty() || payload.job.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Missing required fields",
                "message": "Both name and job are required",
            })),
        );
    }

    let meta = CallMeta {
        from: payload.phone,
        ..Default::default()
    };
    let record = CompletedRecord::new(payload.name, payload.job, &meta);
    info!(name=%record.name, job=%record.job, "storing direct user data");
    match app_state.store.append(record.clone()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "User data stored successfully",
                "data": record,
            })),
        ),
        Err(e) => {
            error!(error=%e, "failed to store direct user data");
            internal_error()
        }
    }
}

pub async fn users_list(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    match app_state.store.all().await {
        Ok(users) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": users.len(),
                "users": users,
            })),
        ),
        Err(e) => {
            error!(error=%e, "failed to read user store");
            internal_error()
        }
    }
}

pub async fn users_get(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match app_state.store.get(&id).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "user": user })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "User not found" })),
        ),
        Err(e) => {
            error!(error=%e, "failed to read user store");
            internal_error()
        }
    }
}

pub async fn users_delete(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    match app_state.store.clear().await {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Deleted {count} users"),
            })),
        ),
        Err(e) => {
            error!(error=%e, "failed to clear user store");
            internal_error()
        }
    }
}

pub async fn health(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let total_users = app_state.store.all().await.map(|u| u.len()).unwrap_or(0);
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": "OK",
        "timestamp": timestamp,
        "totalUsers": total_users,
    }))
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Welcome to the voice intake webhook API!",
    }))
}

fn internal_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "Internal server error" })),
    )
}
