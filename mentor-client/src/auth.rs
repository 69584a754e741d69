use mentor_types::{
    AuthResponse, ForgotPasswordRequest, GoogleLoginRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest, User,
};
use serde::de::IgnoredAny;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::store::AuthStore;

/// Login, registration and session lifecycle.
///
/// Successful calls update the [`AuthStore`]. Failures are already surfaced
/// by the [`ApiClient`], so they are only returned here.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn store(&self) -> &AuthStore {
        self.client.auth()
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        let response: AuthResponse = self.client.post("/auth/login", request).await?;
        self.accept(response, "Signed in successfully!")
    }

    pub async fn login_with_google(&self, request: &GoogleLoginRequest) -> Result<User, ApiError> {
        let response: AuthResponse = self.client.post("/auth/google", request).await?;
        self.accept(response, "Signed in successfully!")
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let response: AuthResponse = self.client.post("/auth/register", request).await?;
        self.accept(response, "Account created successfully!")
    }

    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<String, ApiError> {
        let response: MessageResponse = self.client.post("/auth/forgot-password", request).await?;
        self.client.notifier().success(response.message.clone());
        Ok(response.message)
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<String, ApiError> {
        let response: MessageResponse = self.client.post("/auth/reset-password", request).await?;
        self.client.notifier().success(response.message.clone());
        Ok(response.message)
    }

    /// Re-read the signed-in user. A rejected session is dropped locally.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        match self.client.get::<User>("/auth/me").await {
            Ok(user) => {
                self.store().replace_user(user.clone());
                Ok(user)
            }
            Err(err) => {
                if !err.is_transient() {
                    self.store().clear();
                }
                Err(err)
            }
        }
    }

    /// Exchange the current token for a fresh one.
    pub async fn refresh_token(&self) -> Result<User, ApiError> {
        let response: AuthResponse = self.client.post_empty("/auth/refresh").await?;
        let user = response.user.clone();
        self.store().set_auth(response.user, response.token);
        Ok(user)
    }

    /// Always ends signed out locally, even if the server call fails.
    pub async fn logout(&self) {
        // Silent: the local session is dropped regardless of the outcome.
        if let Err(e) = self
            .client
            .silent()
            .post_empty::<IgnoredAny>("/auth/logout")
            .await
        {
            warn!(error = %e, "remote logout failed");
        }
        self.store().clear();
        info!("signed out");
        self.client.notifier().success("Signed out successfully!");
    }

    fn accept(&self, response: AuthResponse, notice: &str) -> Result<User, ApiError> {
        info!(user_id = response.user.id, "signed in");
        let user = response.user.clone();
        self.store().set_auth(response.user, response.token);
        self.client.notifier().success(notice);
        Ok(user)
    }
}
