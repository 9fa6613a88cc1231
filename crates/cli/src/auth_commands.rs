use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;

use gearshop_auth::{AuthSession, CallbackServer, FileSessionStore, SessionStore};
use gearshop_config::CustomerAuthConfig;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in through the provider's hosted login page.
    Login,
    /// Show the current session status.
    Status,
    /// Clear the local session.
    Logout,
}

pub async fn handle_auth(action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Login => login().await,
        AuthAction::Status => status().await,
        AuthAction::Logout => logout(),
    }
}

fn session_from_env() -> Result<(AuthSession, Arc<FileSessionStore>)> {
    let config = CustomerAuthConfig::from_env()?;
    let store = Arc::new(FileSessionStore::new());
    Ok((AuthSession::new(config, store.clone()), store))
}

async fn login() -> Result<()> {
    let (session, _store) = session_from_env()?;

    // The listener must sit exactly where the registered redirect URI points.
    let redirect = session.flow().config().redirect_uri().clone();
    let port = redirect.port_or_known_default().unwrap_or(80);
    let server = CallbackServer::bind(port).await?;

    let req = session.login()?;
    println!("Opening browser for authentication...");
    if open::that(&req.url).is_err() {
        println!("Could not open browser. Please visit:\n{}", req.url);
    }

    println!("Waiting for callback on {redirect} ...");
    let params = server.wait_for_params().await?;

    println!("Exchanging code for tokens...");
    match session.complete_login(&params).await? {
        Some(user) => println!("Logged in as {}", user.display_name),
        None => println!("Logged in. Profile is unavailable right now."),
    }
    Ok(())
}

async fn status() -> Result<()> {
    let (session, store) = session_from_env()?;

    if !session.flow().is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    let expiry = store
        .session()
        .and_then(|record| record.expires_at)
        .map_or("no recorded expiry".to_string(), |ts| {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let remaining = ts.saturating_sub(now);
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            format!("valid ({hours}h {mins}m remaining)")
        });

    session.initialize().await;
    match session.current_user() {
        Some(user) => println!("Logged in as {} [{expiry}]", user.display_name),
        None => println!("Logged in [{expiry}], profile unavailable."),
    }
    Ok(())
}

fn logout() -> Result<()> {
    let (session, _store) = session_from_env()?;
    let url = session.logout();
    println!("Logged out locally. To end the provider session, visit:\n{url}");
    Ok(())
}
