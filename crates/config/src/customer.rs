use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Customer Account API version used for the profile GraphQL endpoint.
const DEFAULT_API_VERSION: &str = "2024-10";

/// Scopes requested at authorization time.
const DEFAULT_SCOPES: &[&str] = &["openid", "email", "customer-account-api:full"];

/// Where the client posts `{code, codeVerifier}` for the proxied token exchange.
const DEFAULT_EXCHANGE_ENDPOINT: &str = "http://127.0.0.1:8787/api/shopify-auth/callback";

/// Client-side configuration for the Customer Account OAuth integration.
///
/// Required fields are constructor parameters. The redirect URI must be the
/// single callback URL registered with the provider — it is never derived and
/// never defaulted, since any mismatch breaks the provider's redirect
/// allow-list.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CustomerAuthConfig {
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) authorize_url: Url,
    pub(crate) token_url: Url,
    pub(crate) logout_url: Url,
    pub(crate) graphql_url: Url,
    pub(crate) exchange_url: Url,
    pub(crate) scopes: Vec<String>,
}

/// Raw shape of the `[customer_auth]`-style TOML file, validated into
/// [`CustomerAuthConfig`] after parsing.
#[derive(Debug, Deserialize)]
struct CustomerAuthFile {
    client_id: String,
    account_domain: String,
    redirect_uri: String,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    exchange_endpoint: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
}

impl CustomerAuthConfig {
    /// Create a configuration from the required values, deriving the
    /// provider endpoints from the account domain.
    pub fn new(
        client_id: impl Into<String>,
        account_domain: &Url,
        redirect_uri: Url,
    ) -> Result<Self, ConfigError> {
        Self::with_api_version(client_id, account_domain, redirect_uri, DEFAULT_API_VERSION)
    }

    /// Like [`new`](Self::new) but pinning a specific Customer Account API
    /// version for the profile endpoint.
    pub fn with_api_version(
        client_id: impl Into<String>,
        account_domain: &Url,
        redirect_uri: Url,
        api_version: &str,
    ) -> Result<Self, ConfigError> {
        let join = |path: String, field| {
            account_domain
                .join(&path)
                .map_err(|source| ConfigError::InvalidUrl { field, source })
        };

        Ok(Self {
            client_id: client_id.into(),
            redirect_uri,
            authorize_url: join("/authentication/oauth/authorize".into(), "authorize_url")?,
            token_url: join("/authentication/oauth/token".into(), "token_url")?,
            logout_url: join("/authentication/logout".into(), "logout_url")?,
            graphql_url: join(
                format!("/account/customer/api/{api_version}/graphql"),
                "graphql_url",
            )?,
            exchange_url: DEFAULT_EXCHANGE_ENDPOINT
                .parse()
                .map_err(|source| ConfigError::InvalidUrl {
                    field: "exchange_url",
                    source,
                })?,
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `SHOPIFY_CUSTOMER_API_CLIENT_ID`: OAuth client ID
    /// - `SHOPIFY_ACCOUNT_DOMAIN`: customer account domain, e.g. `https://account.example.com`
    /// - `SHOPIFY_OAUTH_REDIRECT_URI`: the registered callback URL
    ///
    /// # Optional env vars
    /// - `SHOPIFY_OAUTH_SCOPES`: space-separated scope override
    /// - `SHOPIFY_CUSTOMER_API_VERSION`: profile API version (default `2024-10`)
    /// - `GEARSHOP_EXCHANGE_ENDPOINT`: backend proxy exchange URL
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = require_env("SHOPIFY_CUSTOMER_API_CLIENT_ID")?;
        let account_domain = parse_url(
            &require_env("SHOPIFY_ACCOUNT_DOMAIN")?,
            "SHOPIFY_ACCOUNT_DOMAIN",
        )?;
        let redirect_uri = parse_url(
            &require_env("SHOPIFY_OAUTH_REDIRECT_URI")?,
            "SHOPIFY_OAUTH_REDIRECT_URI",
        )?;

        let api_version = std::env::var("SHOPIFY_CUSTOMER_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let mut config =
            Self::with_api_version(client_id, &account_domain, redirect_uri, &api_version)?;

        if let Ok(scopes) = std::env::var("SHOPIFY_OAUTH_SCOPES") {
            config = config.with_scopes(scopes.split_whitespace().map(str::to_string).collect());
        }
        if let Ok(endpoint) = std::env::var("GEARSHOP_EXCHANGE_ENDPOINT") {
            config =
                config.with_exchange_url(parse_url(&endpoint, "GEARSHOP_EXCHANGE_ENDPOINT")?);
        }

        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let file: CustomerAuthFile =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;

        let account_domain = parse_url(&file.account_domain, "account_domain")?;
        let redirect_uri = parse_url(&file.redirect_uri, "redirect_uri")?;
        let api_version = file
            .api_version
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let mut config = Self::with_api_version(
            file.client_id,
            &account_domain,
            redirect_uri,
            &api_version,
        )?;
        if let Some(scopes) = file.scopes {
            config = config.with_scopes(scopes);
        }
        if let Some(endpoint) = file.exchange_endpoint {
            config = config.with_exchange_url(parse_url(&endpoint, "exchange_endpoint")?);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the backend proxy endpoint the client exchanges codes against.
    #[must_use]
    pub fn with_exchange_url(mut self, url: Url) -> Self {
        self.exchange_url = url;
        self
    }

    /// Override the provider authorization endpoint.
    #[must_use]
    pub fn with_authorize_url(mut self, url: Url) -> Self {
        self.authorize_url = url;
        self
    }

    /// Override the provider token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the provider logout endpoint.
    #[must_use]
    pub fn with_logout_url(mut self, url: Url) -> Self {
        self.logout_url = url;
        self
    }

    /// Override the customer profile GraphQL endpoint.
    #[must_use]
    pub fn with_graphql_url(mut self, url: Url) -> Self {
        self.graphql_url = url;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn logout_url(&self) -> &Url {
        &self.logout_url
    }

    #[must_use]
    pub fn graphql_url(&self) -> &Url {
        &self.graphql_url
    }

    #[must_use]
    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Scopes joined the way the authorization request wants them.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_url(value: &str, field: &'static str) -> Result<Url, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidUrl { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CustomerAuthConfig {
        CustomerAuthConfig::new(
            "test-client",
            &"https://account.example.com".parse().unwrap(),
            "https://shop.example.com/auth/callback".parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_derived_endpoints() {
        let config = test_config();
        assert_eq!(
            config.authorize_url().as_str(),
            "https://account.example.com/authentication/oauth/authorize"
        );
        assert_eq!(
            config.token_url().as_str(),
            "https://account.example.com/authentication/oauth/token"
        );
        assert_eq!(
            config.logout_url().as_str(),
            "https://account.example.com/authentication/logout"
        );
        assert_eq!(
            config.graphql_url().as_str(),
            "https://account.example.com/account/customer/api/2024-10/graphql"
        );
    }

    #[test]
    fn test_default_scopes() {
        let config = test_config();
        assert_eq!(config.scope_param(), "openid email customer-account-api:full");
    }

    #[test]
    fn test_scope_override() {
        let config = test_config().with_scopes(vec!["openid".into()]);
        assert_eq!(config.scope_param(), "openid");
    }

    #[test]
    fn test_api_version_override() {
        let config = CustomerAuthConfig::with_api_version(
            "test-client",
            &"https://account.example.com".parse().unwrap(),
            "https://shop.example.com/auth/callback".parse().unwrap(),
            "2025-01",
        )
        .unwrap();
        assert_eq!(
            config.graphql_url().as_str(),
            "https://account.example.com/account/customer/api/2025-01/graphql"
        );
    }

    #[test]
    fn test_from_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
client_id = "toml-client"
account_domain = "https://account.example.com"
redirect_uri = "https://shop.example.com/auth/callback"
scopes = ["openid", "email"]
exchange_endpoint = "https://shop.example.com/api/shopify-auth/callback"
"#
        )
        .unwrap();

        let config = CustomerAuthConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.client_id(), "toml-client");
        assert_eq!(config.scope_param(), "openid email");
        assert_eq!(
            config.exchange_url().as_str(),
            "https://shop.example.com/api/shopify-auth/callback"
        );
    }

    #[test]
    fn test_from_toml_file_missing_required() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"client_id = "toml-client""#).unwrap();

        assert!(CustomerAuthConfig::from_toml_file(file.path()).is_err());
    }
}
