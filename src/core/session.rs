//! Signed-in user, bearer token persistence and the cached wallet balance

use anyhow::Result;
use rust_decimal::Decimal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::{LoginResponse, RegisterRequest, User};
use crate::utils::app_config::{AppConfig, TOKEN_ENV};
use crate::utils::is_valid_email;

/// Bearer token kept on disk between runs
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(AppConfig::token_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<String> {
        let token = fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    /// Write the token, readable by the owner only on unix
    pub fn save(&self, token: &str) -> io::Result<()> {
        fs::write(&self.path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Where the bearer token in use came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Env,
    Store,
    Login,
}

pub struct Session {
    api: Arc<dyn GatewayApi>,
    store: Option<TokenStore>,
    user: Option<User>,
    balance: Option<Decimal>,
    token_source: Option<TokenSource>,
}

impl Session {
    pub fn new(api: Arc<dyn GatewayApi>, store: Option<TokenStore>) -> Self {
        Self {
            api,
            store,
            user: None,
            balance: None,
            token_source: None,
        }
    }

    pub fn api(&self) -> Arc<dyn GatewayApi> {
        Arc::clone(&self.api)
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn set_balance(&mut self, balance: Decimal) {
        self.balance = Some(balance);
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Pick up a token from `SMSGW_TOKEN` or the token file and validate it
    ///
    /// Returns `Ok(false)` when there is no usable token.
    pub async fn restore(&mut self) -> Result<bool, ClientError> {
        self.restore_from(env_token()).await
    }

    /// Validate `env_token`, or the stored token when there is none
    pub(crate) async fn restore_from(&mut self, env_token: Option<String>) -> Result<bool, ClientError> {
        let (token, source) = match env_token {
            Some(token) => (token, TokenSource::Env),
            None => match self.store.as_ref().and_then(TokenStore::load) {
                Some(token) => (token, TokenSource::Store),
                None => return Ok(false),
            },
        };

        self.api.set_token(Some(token));
        self.token_source = Some(source);
        match self.api.current_user().await {
            Ok(user) => {
                tracing::info!(user = %user.email, "restored session");
                self.user = Some(user);
                self.refresh_balance_logged().await;
                Ok(true)
            }
            Err(ClientError::Unauthorized) => {
                self.expire();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, ClientError> {
        validate_credentials(username, password)?;

        let response = self.api.login(username.trim(), password).await?;
        self.establish(response);
        self.refresh_balance_logged().await;

        self.user
            .as_ref()
            .ok_or_else(|| ClientError::Decode("login response carried no user".to_string()))
    }

    /// Adopt a successful login response
    pub fn establish(&mut self, response: LoginResponse) {
        self.api.set_token(Some(response.access_token.clone()));

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&response.access_token) {
                tracing::warn!(path = %store.path().display(), "failed to persist token: {}", e);
            }
        }

        tracing::info!(user = %response.user.email, "logged in");
        self.token_source = Some(TokenSource::Login);
        self.user = Some(response.user);
    }

    /// Create the account, then sign in with the same credentials
    pub async fn register(&mut self, request: &RegisterRequest) -> Result<&User, ClientError> {
        validate_registration(request)?;

        let created = self.api.register(request).await?;
        tracing::info!(user = %created.email, "registered account");

        self.login(&request.email, &request.password).await
    }

    pub fn logout(&mut self) {
        self.clear(true);
        tracing::info!("logged out");
    }

    /// Drop the session after the backend rejected the token
    ///
    /// A rejected `SMSGW_TOKEN` leaves the token file alone.
    pub fn expire(&mut self) {
        let forget_stored = self.token_source != Some(TokenSource::Env);
        self.clear(forget_stored);
        tracing::warn!(source = ?self.token_source, "session expired");
        self.token_source = None;
    }

    fn clear(&mut self, forget_stored: bool) {
        self.api.set_token(None);
        if let Some(store) = self.store.as_ref().filter(|_| forget_stored) {
            if let Err(e) = store.clear() {
                tracing::warn!(path = %store.path().display(), "failed to remove token: {}", e);
            }
        }
        self.user = None;
        self.balance = None;
    }

    /// Re-read the wallet balance from the backend
    pub async fn refresh_balance(&mut self) -> Result<Decimal, ClientError> {
        let wallet = self.api.get_wallet().await?;
        self.balance = Some(wallet.balance);
        Ok(wallet.balance)
    }

    async fn refresh_balance_logged(&mut self) {
        if let Err(e) = self.refresh_balance().await {
            tracing::warn!("failed to fetch wallet balance: {}", e);
        }
    }
}

/// Non-blank `SMSGW_TOKEN`, if set
pub fn env_token() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty())
}

pub fn validate_credentials(username: &str, password: &str) -> Result<(), ClientError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ClientError::validation("Username and password are required"));
    }
    Ok(())
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ClientError> {
    if !is_valid_email(request.email.trim()) {
        return Err(ClientError::validation("A valid email address is required"));
    }
    if request.username.trim().is_empty() {
        return Err(ClientError::validation("Username is required"));
    }
    if request.password.len() < 8 {
        return Err(ClientError::validation("Password must be at least 8 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::MockGatewayApi;
    use crate::core::testing::{user, wallet};
    use tempfile::TempDir;

    #[test]
    fn test_token_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));

        assert!(store.load().is_none());
        store.save("jwt-123").unwrap();
        assert_eq!(store.load().as_deref(), Some("jwt-123"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));

        let mut api = MockGatewayApi::new();
        api.expect_login()
            .withf(|username: &str, password: &str| username == "ops" && password == "hunter22")
            .times(1)
            .returning(|_, _| {
                Ok(LoginResponse {
                    access_token: "jwt-abc".to_string(),
                    token_type: Some("bearer".to_string()),
                    user: user(),
                })
            });
        api.expect_set_token()
            .withf(|token: &Option<String>| token.as_deref() == Some("jwt-abc"))
            .times(1)
            .return_const(());
        api.expect_get_wallet().returning(|| Ok(wallet(Decimal::new(40, 0))));

        let mut session = Session::new(Arc::new(api), Some(store.clone()));
        session.login(" ops ", "hunter22").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.balance(), Some(Decimal::new(40, 0)));
        assert_eq!(store.load().as_deref(), Some("jwt-abc"));
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_locally() {
        let api = MockGatewayApi::new();
        let mut session = Session::new(Arc::new(api), None);

        let err = session.login("  ", "secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_expired_token_clears_session() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));
        store.save("stale").unwrap();

        let mut api = MockGatewayApi::new();
        api.expect_set_token().return_const(());
        api.expect_current_user()
            .times(1)
            .returning(|| Err(ClientError::Unauthorized));

        let mut session = Session::new(Arc::new(api), Some(store.clone()));
        assert!(!session.restore_from(None).await.unwrap());
        assert!(!session.is_authenticated());
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_rejected_env_token_keeps_token_file() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));
        store.save("still-good").unwrap();

        let mut api = MockGatewayApi::new();
        api.expect_set_token().return_const(());
        api.expect_current_user()
            .times(1)
            .returning(|| Err(ClientError::Unauthorized));

        let mut session = Session::new(Arc::new(api), Some(store.clone()));
        assert!(!session.restore_from(Some("stale-env".to_string())).await.unwrap());
        assert!(!session.is_authenticated());
        assert_eq!(store.load().as_deref(), Some("still-good"));
        assert_eq!(session.token_source, None);
    }

    #[tokio::test]
    async fn test_stored_token_restores_with_source() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));
        store.save("jwt-stored").unwrap();

        let mut api = MockGatewayApi::new();
        api.expect_set_token()
            .withf(|token: &Option<String>| token.as_deref() == Some("jwt-stored"))
            .times(1)
            .return_const(());
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_get_wallet().returning(|| Ok(wallet(Decimal::new(12, 0))));

        let mut session = Session::new(Arc::new(api), Some(store));
        assert!(session.restore_from(None).await.unwrap());
        assert_eq!(session.token_source, Some(TokenSource::Store));
        assert_eq!(session.balance(), Some(Decimal::new(12, 0)));
    }

    #[tokio::test]
    async fn test_register_validates_before_call() {
        let api = MockGatewayApi::new();
        let mut session = Session::new(Arc::new(api), None);

        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            username: "ops".to_string(),
            name: "Ops".to_string(),
            password: "longenough".to_string(),
        };
        assert!(matches!(
            session.register(&request).await.unwrap_err(),
            ClientError::Validation(_)
        ));
    }
}
