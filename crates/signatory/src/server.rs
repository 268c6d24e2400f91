use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::incoming::IncomingVerifier;
use crate::request::IncomingRequest;
use crate::store::SignatoryStore;

pub const ACTIVITY_JSON: &str = "application/activity+json";

#[derive(Clone)]
pub struct AppState {
    /// Host remote servers address us by, port included when not the default.
    pub public_host: String,
    pub scheme: String,
    pub verifier: Arc<IncomingVerifier>,
    pub store: Arc<dyn SignatoryStore>,
}

impl AppState {
    /// Identity id of the local user `name`.
    pub fn actor_id(&self, name: &str) -> String {
        format!("{}://{}/users/{name}", self.scheme, self.public_host)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(|| async move { (StatusCode::OK, "Ok").into_response() }))
        .route("/users/{name}", get(actor_handler))
        .route("/inbox", post(inbox_handler))
        .with_state(state)
}

pub async fn run(host: String, port: u16, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    tracing::info!(
        address = %listener.local_addr()?,
        public_host = %state.public_host,
        "Listening"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serving HTTP")?;

    Ok(())
}

async fn actor_handler(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let id = state.actor_id(&name);
    match state.store.load(&id) {
        Ok(Some(signatory)) => {
            let mut response = Json(signatory.to_key_document()).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(ACTIVITY_JSON));
            response
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Not found.").into_response(),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to load local signatory");
            (StatusCode::INTERNAL_SERVER_ERROR, "Something wrong happened.").into_response()
        }
    }
}

async fn inbox_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request = IncomingRequest {
        method,
        path,
        host: state.public_host.clone(),
        headers,
        body,
    };

    match state.verifier.verify_incoming(request).await {
        Ok(signed) => {
            tracing::info!(
                key_id = %signed.signature_header.key_id,
                origin = %signed.origin,
                "Accepted signed request"
            );
            (StatusCode::ACCEPTED, "Accepted.").into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, kind = ?e.kind(), "Rejected signed request");
            e.into_response()
        }
    }
}
