use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use gearshop_config::GatewayConfig;

/// Same profile query the client issues directly.
const CUSTOMER_QUERY: &str = "\
query getCustomer {
  customer {
    id
    displayName
    firstName
    lastName
    emailAddress {
      emailAddress
    }
  }
}";

#[derive(Clone)]
pub struct GatewayState {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) http: reqwest::Client,
}

impl GatewayState {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

/// Body of `POST /api/shopify-auth/callback`.
///
/// The redirect URI deliberately is not accepted here: it comes from server
/// configuration, matching the provider allow-list, never from the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    code: String,
    code_verifier: String,
}

/// Body of `POST /api/shopify-auth/customer`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    #[serde(default)]
    access_token: String,
}

fn error_response(status: StatusCode, error: &str, details: Option<Value>) -> Response {
    let mut body = json!({ "error": error });
    if let Some(details) = details {
        body["details"] = details;
    }
    (status, Json(body)).into_response()
}

/// Exchange an authorization code + PKCE verifier for a token bundle.
///
/// This is the confidential half of the login flow: the provider token
/// endpoint is only ever called from here, with the configured client id,
/// redirect URI, and (if issued) client secret.
pub async fn exchange_token(
    State(state): State<GatewayState>,
    Json(req): Json<ExchangeRequest>,
) -> Response {
    let auth = state.config.auth();

    let mut params = vec![
        ("client_id", auth.client_id().to_string()),
        ("grant_type", "authorization_code".to_string()),
        ("redirect_uri", auth.redirect_uri().to_string()),
        ("code", req.code),
        ("code_verifier", req.code_verifier),
    ];
    if let Some(secret) = state.config.client_secret() {
        params.push(("client_secret", secret.expose_secret().to_string()));
    }

    let response = match state
        .http
        .post(auth.token_url().clone())
        .form(&params)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "token endpoint unreachable");
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Token exchange failed",
                Some(json!(e.to_string())),
            );
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        error!(status, detail = %detail, "provider rejected token exchange");
        return error_response(
            StatusCode::BAD_GATEWAY,
            "Token exchange failed",
            Some(json!(detail)),
        );
    }

    match response.json::<Value>().await {
        Ok(tokens) => (StatusCode::OK, Json(tokens)).into_response(),
        Err(e) => {
            error!(error = %e, "provider returned an unreadable token bundle");
            error_response(StatusCode::BAD_GATEWAY, "Token exchange failed", None)
        }
    }
}

/// Proxy the customer profile query server-side.
///
/// The browser cannot reach the Customer Account GraphQL endpoint across
/// origins, so the storefront posts its bearer token here instead.
pub async fn fetch_customer(
    State(state): State<GatewayState>,
    Json(req): Json<CustomerRequest>,
) -> Response {
    if req.access_token.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Access token is required", None);
    }

    let auth = state.config.auth();
    let response = match state
        .http
        .post(auth.graphql_url().clone())
        .bearer_auth(&req.access_token)
        .json(&json!({ "query": CUSTOMER_QUERY }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "customer endpoint unreachable");
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Failed to fetch customer data",
                Some(json!(e.to_string())),
            );
        }
    };

    if !response.status().is_success() {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let detail = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "customer profile request rejected");
        return error_response(status, "Failed to fetch customer data", Some(json!(detail)));
    }

    let body = match response.json::<Value>().await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "customer endpoint returned an unreadable body");
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Failed to fetch customer data",
                None,
            );
        }
    };

    if let Some(errors) = body.get("errors") {
        warn!(errors = %errors, "customer query returned GraphQL errors");
        return error_response(
            StatusCode::BAD_REQUEST,
            "GraphQL query failed",
            Some(errors.clone()),
        );
    }

    let customer = body
        .get("data")
        .and_then(|data| data.get("customer"))
        .cloned()
        .unwrap_or(Value::Null);
    (StatusCode::OK, Json(customer)).into_response()
}
