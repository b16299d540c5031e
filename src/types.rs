//! Wire types for the auth endpoints. Field names follow the API's
//! camelCase convention; aliases cover the variants servers have shipped.

use crate::role::Role;
use serde::{Deserialize, Serialize};

/// Success payload returned by login, registration, OTP verification and
/// refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: Profile,
    /// Access token lifetime in seconds, informational only; expiry is
    /// always re-derived from the token's own `exp` claim.
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "id")]
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email or phone number, depending on how the account was registered.
    pub user_identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub password: String,
}

/// Delivery channel for one-time passcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub user_identifier: String,
    pub channel: OtpChannel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyRequest {
    pub user_identifier: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn auth_response_parses_wire_payload() -> Result<()> {
        let payload = json!({
            "token": "access-token",
            "refreshToken": "refresh-token",
            "expiresIn": 900,
            "user": {
                "userId": "u-1",
                "role": "TENANT",
                "firstName": "Ada",
                "email": "ada@example.test"
            }
        });

        let response: AuthResponse = serde_json::from_value(payload)?;
        assert_eq!(response.token, "access-token");
        assert_eq!(response.refresh_token, "refresh-token");
        assert_eq!(response.expires_in, 900);
        assert_eq!(response.user.user_id, "u-1");
        assert_eq!(response.user.role, Role::Tenant);
        assert_eq!(response.user.first_name.as_deref(), Some("Ada"));
        assert_eq!(response.user.last_name, None);
        Ok(())
    }

    #[test]
    fn profile_accepts_id_alias() -> Result<()> {
        let profile: Profile =
            serde_json::from_value(json!({"id": "u-2", "role": "owner"}))?;
        assert_eq!(profile.user_id, "u-2");
        assert_eq!(profile.role, Role::Owner);
        Ok(())
    }

    #[test]
    fn requests_serialize_camel_case() -> Result<()> {
        let login = LoginRequest {
            user_identifier: "ada@example.test".to_string(),
            password: "hunter2".to_string(),
        };
        let value = serde_json::to_value(&login)?;
        assert_eq!(
            value,
            json!({"userIdentifier": "ada@example.test", "password": "hunter2"})
        );

        let otp = OtpRequest {
            user_identifier: "+15550100".to_string(),
            channel: OtpChannel::Sms,
        };
        let value = serde_json::to_value(&otp)?;
        assert_eq!(
            value,
            json!({"userIdentifier": "+15550100", "channel": "sms"})
        );
        Ok(())
    }
}
