use tracing::warn;
use url::Url;

use gearshop_config::CustomerAuthConfig;

use crate::error::AuthError;
use crate::store::SessionStore;
use crate::types::AuthenticatedUser;

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

/// Fetches the current customer profile from the Customer Account API.
pub struct IdentityClient {
    graphql_url: Url,
    http: reqwest::Client,
}

impl IdentityClient {
    #[must_use]
    pub fn new(config: &CustomerAuthConfig) -> Self {
        Self {
            graphql_url: config.graphql_url().clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Resolve the current customer, or `None` without a session token (no
    /// network call is made) and on any fetch failure.
    ///
    /// Failures are soft: they are logged and the caller treats the session
    /// as anonymous. Nothing here is allowed to take the UI down.
    pub async fn fetch_current_user(
        &self,
        store: &dyn SessionStore,
    ) -> Option<AuthenticatedUser> {
        let record = store.session()?;
        match self.fetch(&record.access_token).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "customer profile fetch failed");
                None
            }
        }
    }

    async fn fetch(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let response = self
            .http
            .post(self.graphql_url.clone())
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "query": CUSTOMER_QUERY }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ProfileFetchFailed(format!(
                "status {}",
                response.status().as_u16()
            )));
        }

        let body = response.json::<serde_json::Value>().await?;
        if let Some(errors) = body.get("errors") {
            return Err(AuthError::ProfileFetchFailed(errors.to_string()));
        }

        map_customer(&body["data"]["customer"])
    }
}

/// Map the provider's customer shape onto [`AuthenticatedUser`].
fn map_customer(customer: &serde_json::Value) -> Result<AuthenticatedUser, AuthError> {
    let id = customer["id"]
        .as_str()
        .ok_or_else(|| AuthError::ProfileFetchFailed("customer id missing".into()))?
        .to_string();

    let display_name = match customer["displayName"].as_str() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let first = customer["firstName"].as_str().unwrap_or_default();
            let last = customer["lastName"].as_str().unwrap_or_default();
            format!("{first} {last}").trim().to_string()
        }
    };

    let email = customer["emailAddress"]["emailAddress"]
        .as_str()
        .map(str::to_string);

    Ok(AuthenticatedUser {
        id,
        display_name,
        email,
    })
}
