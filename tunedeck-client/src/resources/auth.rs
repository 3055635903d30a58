//! Authentication and the current user.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tunedeck_core::{keys, ApiResult, AuthResponse, LoginRequest, RegisterRequest, User};

use super::Context;
use crate::events::ClientEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone)]
pub struct AuthApi {
    ctx: Context,
}

impl AuthApi {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        self.ctx
            .cached_get(keys::auth_me(), "/auth/me".to_string(), None::<()>)
            .await
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let response = self.post::<AuthResponse, _>("/auth/login", request).await?;
        self.sign_in(&response);
        Ok(response)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        let response = self.post::<AuthResponse, _>("/auth/register", request).await?;
        self.sign_in(&response);
        Ok(response)
    }

    /// Exchange a refresh token for a new session token.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthResponse> {
        let body = json!({ "refreshToken": refresh_token });
        let response = self.post::<AuthResponse, _>("/auth/refresh", &body).await?;
        if !response.token.is_empty() {
            self.ctx.transport.session().set_token(response.token.clone());
        }
        Ok(response)
    }

    /// Sign out on the backend, then drop the token and every cached query.
    ///
    /// The token is cleared before the cache so no read can refill the cache
    /// with the old credentials.
    pub async fn logout(&self) -> ApiResult<()> {
        let transport = &self.ctx.transport;
        self.ctx
            .writes
            .run(move || transport.post::<IgnoredAny, ()>("/auth/logout", None))
            .await?;
        let session = self.ctx.transport.session();
        session.clear_token();
        self.ctx.cache.clear();
        session.emit(ClientEvent::SignedOut);
        tracing::info!("Signed out");
        Ok(())
    }

    pub async fn update_profile<B>(&self, patch: &B) -> ApiResult<User>
    where
        B: Serialize + ?Sized,
    {
        let transport = &self.ctx.transport;
        let user = self
            .ctx
            .writes
            .run(move || transport.put::<User, B>("/auth/profile", Some(patch)))
            .await?;
        self.seed_current_user(&user);
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> ApiResult<()> {
        self.post::<IgnoredAny, _>("/auth/change-password", change)
            .await
            .map(|_| ())
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
        self.post::<IgnoredAny, _>("/auth/forgot-password", &json!({ "email": email }))
            .await
            .map(|_| ())
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> ApiResult<()> {
        self.post::<IgnoredAny, _>("/auth/reset-password", reset)
            .await
            .map(|_| ())
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let transport = &self.ctx.transport;
        self.ctx
            .writes
            .run(move || transport.post::<T, B>(path, Some(body)))
            .await
    }

    fn sign_in(&self, response: &AuthResponse) {
        let session = self.ctx.transport.session();
        if !response.token.is_empty() {
            session.set_token(response.token.clone());
        }
        self.seed_current_user(&response.user);
        session.emit(ClientEvent::SignedIn {
            username: response.user.username.clone(),
        });
        tracing::info!(username = %response.user.username, "Signed in");
    }

    fn seed_current_user(&self, user: &User) {
        if let Err(err) = self.ctx.cache.write(&keys::auth_me(), user) {
            tracing::warn!(error = %err, "Failed to cache current user");
        }
    }
}
