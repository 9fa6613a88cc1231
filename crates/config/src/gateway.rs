use secrecy::SecretString;

use crate::customer::CustomerAuthConfig;
use crate::error::ConfigError;

/// Server-side configuration for the token-exchange proxy.
///
/// The gateway is the only place a confidential client secret may live; the
/// browser-facing flow never sees it.
#[non_exhaustive]
pub struct GatewayConfig {
    pub(crate) auth: CustomerAuthConfig,
    pub(crate) bind: String,
    pub(crate) port: u16,
    pub(crate) client_secret: Option<SecretString>,
    pub(crate) allowed_origin: Option<String>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(auth: CustomerAuthConfig) -> Self {
        Self {
            auth,
            bind: "127.0.0.1".into(),
            port: 8787,
            client_secret: None,
            allowed_origin: None,
        }
    }

    /// Create gateway configuration from environment variables.
    ///
    /// Requires the same variables as [`CustomerAuthConfig::from_env`], plus:
    /// - `SHOPIFY_CUSTOMER_API_CLIENT_SECRET` (optional): confidential client secret
    /// - `GEARSHOP_ALLOWED_ORIGIN` (optional): storefront origin for CORS
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(CustomerAuthConfig::from_env()?);

        if let Ok(secret) = std::env::var("SHOPIFY_CUSTOMER_API_CLIENT_SECRET") {
            if !secret.is_empty() {
                config.client_secret = Some(SecretString::new(secret));
            }
        }
        if let Ok(origin) = std::env::var("GEARSHOP_ALLOWED_ORIGIN") {
            if !origin.is_empty() {
                config.allowed_origin = Some(origin);
            }
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: SecretString) -> Self {
        self.client_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn auth(&self) -> &CustomerAuthConfig {
        &self.auth
    }

    #[must_use]
    pub fn bind(&self) -> &str {
        &self.bind
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&SecretString> {
        self.client_secret.as_ref()
    }

    #[must_use]
    pub fn allowed_origin(&self) -> Option<&str> {
        self.allowed_origin.as_deref()
    }
}
