//! Role-aware authentication and session client for property management
//! APIs.
//!
//! The crate covers the client half of the auth contract: an injected
//! [`TokenStore`] owning the access/refresh pair, an [`ApiClient`] that
//! attaches bearer credentials and recovers from a 401 with a single
//! refresh-and-retry, an [`AuthService`] exposing role-parameterized login,
//! registration, OTP and password flows, and a [`SessionManager`] whose
//! watch channel and [`GuardDecision`]s drive role-gated navigation.
//!
//! ```no_run
//! use portero::{ApiClient, ApiConfig, AuthService, LoginRequest, Role, SessionManager, TokenStore};
//!
//! # async fn run() -> Result<(), portero::Error> {
//! let config = ApiConfig::new("https://api.example.test")?;
//! let client = ApiClient::new(config, TokenStore::in_memory())?;
//! let session = SessionManager::new(AuthService::new(client));
//!
//! session
//!     .login(
//!         Role::Tenant,
//!         &LoginRequest {
//!             user_identifier: "ada@example.test".into(),
//!             password: "hunter2".into(),
//!         },
//!     )
//!     .await?;
//!
//! let decision = session.guard(&[Role::Tenant]);
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod role;
pub mod session;
pub mod token;
pub mod types;

pub use auth::AuthService;
pub use client::{ApiClient, ClientEvent, NoticeKind};
pub use config::ApiConfig;
pub use error::Error;
pub use role::Role;
pub use session::{GuardDecision, LOGIN_ROUTE, SessionManager, SessionState, evaluate};
pub use token::{Claims, MemoryTokenStorage, TokenStorage, TokenStore};
pub use types::{
    AuthResponse, LoginRequest, OtpChannel, OtpRequest, OtpVerifyRequest, PasswordResetRequest,
    Profile, RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest,
};
