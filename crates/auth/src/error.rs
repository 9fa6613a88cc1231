#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The callback URL carried no authorization code or no state parameter.
    #[error("callback is missing the code or state parameter")]
    InvalidCallback,
    /// No pending login in the session store — storage was cleared, or the
    /// callback landed in a different session than the one that started login.
    #[error("no pending login state found; restart the login")]
    MissingPkceState,
    /// The returned state does not match the stored one. Treated as a
    /// potential forgery or replay; the exchange is never attempted.
    #[error("state parameter does not match the pending login")]
    StateMismatch,
    /// The exchange proxy rejected the code.
    #[error("token exchange failed (status {status}): {detail}")]
    TokenExchangeFailed { status: u16, detail: String },
    /// The callback already ran for this login attempt; authorization codes
    /// are single-use.
    #[error("callback was already processed for this login attempt")]
    CallbackAlreadyHandled,
    /// The customer profile request failed or returned an unusable shape.
    /// Soft: consumers see an anonymous session, not an error.
    #[error("customer profile fetch failed: {0}")]
    ProfileFetchFailed(String),
    /// Local callback listener could not run.
    #[error("callback listener error: {0}")]
    Listener(String),
    /// Session persistence failed.
    #[error("session storage error: {0}")]
    Storage(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
