pub mod callback_server;
pub mod context;
pub mod error;
pub mod flow;
pub mod identity;
pub mod pkce;
pub mod store;
pub mod types;

pub use callback_server::CallbackServer;
pub use context::{AuthSession, AuthStage};
pub use error::AuthError;
pub use flow::{AuthorizationRequest, CallbackParams, OAuthFlow};
pub use identity::IdentityClient;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{AuthenticatedUser, PendingLogin, PkcePair, SessionRecord, TokenResponse};
