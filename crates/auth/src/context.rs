use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use gearshop_config::CustomerAuthConfig;

use crate::error::AuthError;
use crate::flow::{AuthorizationRequest, CallbackParams, OAuthFlow};
use crate::identity::IdentityClient;
use crate::store::SessionStore;
use crate::types::AuthenticatedUser;

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStage {
    /// Initial resolution has not completed yet; consumers must not render
    /// personalized state.
    Loading,
    Authenticated(AuthenticatedUser),
    Anonymous,
}

/// Application-wide authentication facade.
///
/// The only surface the rest of the storefront (cart gating, admin gating,
/// navbar) talks to. Transitions `Loading → Authenticated | Anonymous` once
/// on [`initialize`](Self::initialize) and again on login/logout.
pub struct AuthSession {
    flow: OAuthFlow,
    identity: IdentityClient,
    stage: Mutex<AuthStage>,
}

impl AuthSession {
    #[must_use]
    pub fn new(config: CustomerAuthConfig, store: Arc<dyn SessionStore>) -> Self {
        let identity = IdentityClient::new(&config);
        Self {
            flow: OAuthFlow::new(config, store),
            identity,
            stage: Mutex::new(AuthStage::Loading),
        }
    }

    fn stage_mut(&self) -> MutexGuard<'_, AuthStage> {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn flow(&self) -> &OAuthFlow {
        &self.flow
    }

    /// Resolve the stored session into a stage.
    ///
    /// A valid token with a fetchable profile becomes `Authenticated`; a
    /// failed profile fetch is soft and leaves the session `Anonymous`
    /// without destroying the token.
    pub async fn initialize(&self) {
        if !self.flow.is_authenticated() {
            *self.stage_mut() = AuthStage::Anonymous;
            return;
        }

        let stage = match self.identity.fetch_current_user(self.store()).await {
            Some(user) => AuthStage::Authenticated(user),
            None => AuthStage::Anonymous,
        };
        *self.stage_mut() = stage;
    }

    /// Start a login attempt. The caller navigates to the returned URL; the
    /// session resumes at [`complete_login`](Self::complete_login).
    pub fn login(&self) -> Result<AuthorizationRequest, AuthError> {
        self.flow.begin_login()
    }

    /// Finish the login from the provider callback.
    ///
    /// On success the session token is persisted even when the follow-up
    /// profile fetch fails; in that case `current_user` stays `None` and
    /// consumers keep personalized UI hidden.
    pub async fn complete_login(
        &self,
        params: &CallbackParams,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        self.flow.handle_callback(params).await?;

        let user = self.identity.fetch_current_user(self.store()).await;
        *self.stage_mut() = match &user {
            Some(user) => AuthStage::Authenticated(user.clone()),
            None => AuthStage::Anonymous,
        };
        Ok(user)
    }

    /// Clear the session and return the provider logout URL to navigate to.
    #[must_use]
    pub fn logout(&self) -> String {
        let url = self.flow.logout();
        *self.stage_mut() = AuthStage::Anonymous;
        info!("customer logged out");
        url
    }

    #[must_use]
    pub fn current_user(&self) -> Option<AuthenticatedUser> {
        match &*self.stage_mut() {
            AuthStage::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(&*self.stage_mut(), AuthStage::Loading)
    }

    #[must_use]
    pub fn stage(&self) -> AuthStage {
        self.stage_mut().clone()
    }

    fn store(&self) -> &dyn SessionStore {
        self.flow.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use crate::types::SessionRecord;

    const GRAPHQL_PATH: &str = "/account/customer/api/2024-10/graphql";
    const EXCHANGE_PATH: &str = "/api/shopify-auth/callback";

    fn test_session(
        server: &mockito::ServerGuard,
        store: Arc<MemorySessionStore>,
    ) -> AuthSession {
        let config = CustomerAuthConfig::new(
            "test-client",
            &server.url().parse().unwrap(),
            "https://shop.example.com/auth/callback".parse().unwrap(),
        )
        .unwrap()
        .with_exchange_url(format!("{}{}", server.url(), EXCHANGE_PATH).parse().unwrap());
        AuthSession::new(config, store)
    }

    fn customer_body() -> &'static str {
        r#"{"data":{"customer":{
            "id":"gid://shopify/Customer/1",
            "displayName":"Jordan Diaz",
            "emailAddress":{"emailAddress":"jordan@example.com"}
        }}}"#
    }

    #[tokio::test]
    async fn test_starts_loading_then_anonymous_without_session() {
        let server = mockito::Server::new_async().await;
        let session = test_session(&server, Arc::new(MemorySessionStore::new()));

        assert!(session.is_loading());
        session.initialize().await;
        assert!(!session.is_loading());
        assert_eq!(session.stage(), AuthStage::Anonymous);
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn test_initialize_resolves_stored_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GRAPHQL_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(customer_body())
            .create_async()
            .await;

        let store = Arc::new(MemorySessionStore::new());
        store
            .set_session(SessionRecord {
                access_token: "T".into(),
                refresh_token: None,
                id_token: None,
                expires_at: None,
            })
            .unwrap();
        let session = test_session(&server, store);

        session.initialize().await;
        let user = session.current_user().unwrap();
        assert_eq!(user.display_name, "Jordan Diaz");
    }

    #[tokio::test]
    async fn test_profile_failure_is_anonymous_but_keeps_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GRAPHQL_PATH)
            .with_status(500)
            .create_async()
            .await;

        let store = Arc::new(MemorySessionStore::new());
        store
            .set_session(SessionRecord {
                access_token: "T".into(),
                refresh_token: None,
                id_token: None,
                expires_at: None,
            })
            .unwrap();
        let session = test_session(&server, store.clone());

        session.initialize().await;
        assert_eq!(session.stage(), AuthStage::Anonymous);
        assert!(store.session().is_some());
    }

    #[tokio::test]
    async fn test_complete_login_transitions_to_authenticated() {
        let mut server = mockito::Server::new_async().await;
        let _exchange = server
            .mock("POST", EXCHANGE_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"T","expires_in":3600}"#)
            .create_async()
            .await;
        let _profile = server
            .mock("POST", GRAPHQL_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(customer_body())
            .create_async()
            .await;

        let store = Arc::new(MemorySessionStore::new());
        let session = test_session(&server, store.clone());

        let req = session.login().unwrap();
        let params = CallbackParams {
            code: Some("ABC".into()),
            state: Some(req.state.clone()),
        };
        let user = session.complete_login(&params).await.unwrap().unwrap();

        assert_eq!(user.display_name, "Jordan Diaz");
        assert!(matches!(session.stage(), AuthStage::Authenticated(_)));
        assert_eq!(store.session().unwrap().access_token, "T");
    }

    #[tokio::test]
    async fn test_logout_resets_to_anonymous() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemorySessionStore::new());
        store
            .set_session(SessionRecord {
                access_token: "T".into(),
                refresh_token: None,
                id_token: None,
                expires_at: None,
            })
            .unwrap();
        let session = test_session(&server, store.clone());

        let url = session.logout();
        assert!(url.ends_with("/authentication/logout"));
        assert_eq!(session.stage(), AuthStage::Anonymous);
        assert!(store.session().is_none());
    }
}
