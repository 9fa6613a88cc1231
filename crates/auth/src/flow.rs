use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use url::Url;

use gearshop_config::CustomerAuthConfig;

use crate::error::AuthError;
use crate::pkce;
use crate::store::SessionStore;
use crate::types::{PendingLogin, PkcePair, SessionRecord, TokenResponse};

/// Authorization URL plus the values stored for the redirect round-trip.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub verifier: String,
}

/// Raw `code`/`state` pulled off the callback URL, unvalidated.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Extract the parameters from the full redirect URL.
    #[must_use]
    pub fn from_redirect_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// The OAuth/PKCE login flow against the Customer Account API.
///
/// Owns login initiation and callback processing. The token exchange goes
/// through the backend proxy — this client never calls the provider's token
/// endpoint and never holds a client secret.
pub struct OAuthFlow {
    config: CustomerAuthConfig,
    store: Arc<dyn SessionStore>,
    http: reqwest::Client,
    /// One-shot latch: a callback view can be mounted twice, the exchange
    /// must run once.
    exchanged: AtomicBool,
}

impl OAuthFlow {
    #[must_use]
    pub fn new(config: CustomerAuthConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            store,
            http: reqwest::Client::new(),
            exchanged: AtomicBool::new(false),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CustomerAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Start a login attempt: store fresh state + PKCE values as pending and
    /// build the authorization URL for the caller to navigate to.
    ///
    /// Control does not return synchronously after navigation; the flow
    /// resumes only when the callback route is reached.
    pub fn begin_login(&self) -> Result<AuthorizationRequest, AuthError> {
        let state = pkce::generate_state();
        let pair = PkcePair::generate();

        self.store.set_pending(PendingLogin {
            state: state.clone(),
            verifier: pair.verifier.clone(),
        })?;
        self.exchanged.store(false, Ordering::SeqCst);

        let mut url = self.config.authorize_url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id())
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.config.redirect_uri().as_str())
            .append_pair("scope", &self.config.scope_param())
            .append_pair("state", &state)
            .append_pair("code_challenge", &pair.challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            verifier: pair.verifier,
        })
    }

    /// Process the provider callback: validate, exchange the code through the
    /// backend proxy, persist the session.
    ///
    /// The protocol is linear and not retryable mid-way; any failure aborts
    /// the attempt and the user restarts login. Pending state is single-use
    /// and is cleared on success and failure alike.
    ///
    /// # Errors
    ///
    /// [`AuthError::CallbackAlreadyHandled`] on a second invocation,
    /// [`AuthError::InvalidCallback`], [`AuthError::MissingPkceState`],
    /// [`AuthError::StateMismatch`], or [`AuthError::TokenExchangeFailed`]
    /// per the step that failed.
    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<SessionRecord, AuthError> {
        if self.exchanged.swap(true, Ordering::SeqCst) {
            return Err(AuthError::CallbackAlreadyHandled);
        }

        let result = self.process_callback(params).await;
        self.store.clear_pending();

        if let Err(e) = &result {
            warn!(error = %e, "login callback failed");
        }
        result
    }

    async fn process_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<SessionRecord, AuthError> {
        let (Some(code), Some(state)) = (params.code.as_deref(), params.state.as_deref())
        else {
            return Err(AuthError::InvalidCallback);
        };

        let pending = self.store.pending().ok_or(AuthError::MissingPkceState)?;

        if state != pending.state {
            warn!("state parameter mismatch on callback");
            return Err(AuthError::StateMismatch);
        }

        let tokens = self.exchange(code, &pending.verifier).await?;

        let record = SessionRecord {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_at: tokens.expires_in.map(|secs| unix_now() + secs),
        };
        self.store.set_session(record.clone())?;

        info!("customer session established");
        Ok(record)
    }

    /// Exchange `{code, codeVerifier}` through the backend proxy.
    async fn exchange(&self, code: &str, verifier: &str) -> Result<TokenResponse, AuthError> {
        let body = serde_json::json!({
            "code": code,
            "codeVerifier": verifier,
        });

        let response = self
            .http
            .post(self.config.exchange_url().clone())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed { status, detail });
        }

        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// True iff a token is present and unexpired.
    ///
    /// Detecting an expired token clears the session as a side effect; there
    /// is no silent refresh.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let Some(record) = self.store.session() else {
            return false;
        };
        match record.expires_at {
            Some(at) if at <= unix_now() => {
                info!("access token expired, clearing session");
                self.store.clear_session();
                false
            }
            _ => true,
        }
    }

    /// Clear all local session state and return the provider logout URL the
    /// caller should navigate to, ending the provider-side session too.
    #[must_use]
    pub fn logout(&self) -> String {
        self.store.clear_session();
        self.store.clear_pending();
        self.config.logout_url().to_string()
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
