use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use tokio::sync::oneshot;
use tracing::info;

use crate::error::AuthError;
use crate::flow::CallbackParams;

/// How long to wait for the user to finish the provider-side login.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

const LANDING_PAGE: &str = "<!doctype html><html><body>\
<p>Login complete. You can close this tab and return to the terminal.</p>\
</body></html>";

#[derive(Clone)]
struct CaptureState {
    tx: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>,
}

/// One-shot local listener standing in for the storefront's callback route.
///
/// Captures the raw `code`/`state` from the provider redirect and hands them
/// to the callback processor; validation happens there, not here.
pub struct CallbackServer {
    listener: tokio::net::TcpListener,
    port: u16,
}

impl CallbackServer {
    /// Bind the callback listener on localhost. Port `0` picks a free port.
    pub async fn bind(port: u16) -> Result<Self, AuthError> {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| {
                AuthError::Listener(format!("failed to bind 127.0.0.1:{port}: {e}"))
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?
            .port();
        Ok(Self { listener, port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve `GET /auth/callback` until the redirect arrives, then shut down
    /// and return the captured parameters.
    pub async fn wait_for_params(self) -> Result<CallbackParams, AuthError> {
        self.wait_with_timeout(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS))
            .await
    }

    pub async fn wait_with_timeout(
        self,
        timeout: Duration,
    ) -> Result<CallbackParams, AuthError> {
        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = CaptureState {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .route("/auth/callback", get(capture))
            .with_state(state);

        let port = self.port;
        let server = tokio::spawn(async move {
            let _ = axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        info!(port, "waiting for provider callback");
        let outcome = tokio::time::timeout(timeout, rx).await;
        let _ = shutdown_tx.send(());
        let _ = server.await;

        match outcome {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(AuthError::Listener("callback channel closed".into())),
            Err(_) => Err(AuthError::Listener(
                "timed out waiting for the provider callback".into(),
            )),
        }
    }
}

async fn capture(
    State(state): State<CaptureState>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let params = CallbackParams {
        code: query.get("code").cloned(),
        state: query.get("state").cloned(),
    };
    if let Some(tx) = state
        .tx
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        let _ = tx.send(params);
    }
    Html(LANDING_PAGE)
}
