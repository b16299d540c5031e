//! Authentication operations over the API. One role-parameterized entry
//! point per flow rather than a method per persona; the closed [`Role`] enum
//! is the dispatch key, so an unsupported role cannot reach the network.

use crate::client::ApiClient;
use crate::error::Error;
use crate::role::Role;
use crate::types::{
    AuthResponse, LoginRequest, OtpRequest, OtpVerifyRequest, PasswordResetRequest, Profile,
    RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest,
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Authenticates against `/auth/{role}/login`. The token pair is stored
    /// before this returns.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn login(&self, role: Role, credentials: &LoginRequest) -> Result<Profile, Error> {
        let path = format!("/auth/{}/login", role.path_segment());
        let response: AuthResponse = self.client.post(&path, credentials).await?;
        Ok(self.store_session(response))
    }

    /// Registers a new account for `role`. A successful registration also
    /// authenticates, so the token pair is stored before this returns.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn register(
        &self,
        role: Role,
        registration: &RegisterRequest,
    ) -> Result<Profile, Error> {
        let path = format!("/auth/{}/register", role.path_segment());
        let response: AuthResponse = self.client.post(&path, registration).await?;
        Ok(self.store_session(response))
    }

    /// Asks the server to deliver a one-time passcode.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn request_otp(&self, role: Role, request: &OtpRequest) -> Result<(), Error> {
        let path = format!("/auth/{}/otp/request", role.path_segment());
        self.client.post_unit(&path, request).await
    }

    /// Verifies a one-time passcode. A successful verification
    /// authenticates, so the token pair is stored before this returns.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn verify_otp(
        &self,
        role: Role,
        verification: &OtpVerifyRequest,
    ) -> Result<Profile, Error> {
        let path = format!("/auth/{}/otp/verify", role.path_segment());
        let response: AuthResponse = self.client.post(&path, verification).await?;
        Ok(self.store_session(response))
    }

    /// Exchanges the stored refresh token for a new pair.
    ///
    /// # Errors
    /// Returns an unauthorized error when no refresh token is stored, or the
    /// normalized error from the refresh call. Either way the store ends
    /// empty on failure.
    pub async fn refresh(&self) -> Result<Profile, Error> {
        let response = self.client.refresh().await?;
        Ok(response.user)
    }

    /// Ends the session. Local tokens are always cleared; a failing
    /// server-side logout is logged and otherwise ignored, local
    /// invalidation takes priority over server acknowledgment.
    pub async fn logout(&self) {
        if let Err(err) = self.client.post_empty("/auth/logout").await {
            warn!("server-side logout failed: {err}");
        } else {
            debug!("server-side logout acknowledged");
        }
        self.client.tokens().clear();
    }

    /// Fetches the authenticated profile from `/auth/me`.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn current_user(&self) -> Result<Profile, Error> {
        self.client.get("/auth/me").await
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn update_password(&self, request: &UpdatePasswordRequest) -> Result<(), Error> {
        self.client.post_unit("/auth/password/update", request).await
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn request_password_reset(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<(), Error> {
        self.client
            .post_unit("/auth/password/reset/request", request)
            .await
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), Error> {
        self.client.post_unit("/auth/password/reset", request).await
    }

    /// True iff a stored, non-expired access token exists.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.client.tokens().is_authenticated()
    }

    /// Role claim of the stored token; `None` on missing, expired or
    /// undecodable tokens, never an error.
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.client.tokens().current_role()
    }

    /// Subject claim of the stored token, same absence rules as
    /// [`Self::current_role`].
    #[must_use]
    pub fn current_user_id(&self) -> Option<String> {
        self.client.tokens().current_user_id()
    }

    fn store_session(&self, response: AuthResponse) -> Profile {
        self.client
            .tokens()
            .set_pair(&response.token, &response.refresh_token);
        response.user
    }
}
