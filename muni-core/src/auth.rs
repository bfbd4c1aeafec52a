use crate::error::ApiError;
use crate::http::{ApiClient, TOKEN_PAIR_PATH};
use crate::session::{Session, SessionCell};
use muni_schema::{validate_register, LoginResponse, RegisterData, User};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

pub const USER_PATH: &str = "/user";
pub const REGISTER_PATH: &str = "/register";

#[derive(Clone)]
pub struct AuthStore {
    client: ApiClient,
}

impl AuthStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn session(&self) -> &Arc<SessionCell> {
        self.client.session()
    }

    pub fn snapshot(&self) -> Session {
        self.session().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session().subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Exchanges credentials for tokens, then loads the profile. Only a
    /// successful profile fetch marks the session authenticated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let response: LoginResponse = self
            .client
            .post_json(TOKEN_PAIR_PATH, &json!({ "email": email, "password": password }))
            .await
            .inspect_err(|e| error!("login failed: {e}"))?;
        self.session().set_tokens(response.tokens());

        let user: User = self
            .client
            .get_json(USER_PATH)
            .await
            .inspect_err(|e| error!("profile fetch after login failed: {e}"))?;
        self.session().set_user(user.clone(), true);
        info!(user_id = user.id, "logged in");
        Ok(user)
    }

    pub fn logout(&self) {
        self.session().teardown();
    }

    pub async fn refresh_token(&self) -> Result<(), ApiError> {
        self.client.refresh_credentials().await
    }

    /// Cached profile, or fetched and cached.
    pub async fn get_user(&self) -> Result<User, ApiError> {
        if let Some(user) = self.session().snapshot().user {
            return Ok(user);
        }
        let user: User = self.client.get_json(USER_PATH).await?;
        self.session().set_user(user.clone(), false);
        Ok(user)
    }

    pub async fn register(&self, data: &RegisterData) -> Result<Value, ApiError> {
        validate_register(data)?;
        self.client.post_json(REGISTER_PATH, data).await
    }
}
