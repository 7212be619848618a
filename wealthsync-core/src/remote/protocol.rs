//! Wire types shared by the live store and the relay server.
//!
//! Documents themselves travel as plain JSON objects in the persisted
//! camelCase layout; these types cover the small control endpoints.

use serde::{Deserialize, Serialize};

/// Path of the anonymous sign-in endpoint.
pub const AUTH_PATH: &str = "/auth/anonymous";
/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Path of a family's document resource.
pub fn family_path(group: &str) -> String {
    format!("/families/{}", group)
}

/// Path of a family's live subscription.
pub fn subscribe_path(group: &str) -> String {
    format!("/families/{}/subscribe", group)
}

/// Response from `POST /auth/anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// Anonymous user the token belongs to.
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(family_path("ABCD-1234"), "/families/ABCD-1234");
        assert_eq!(
            subscribe_path("ABCD-1234"),
            "/families/ABCD-1234/subscribe"
        );
    }

    #[test]
    fn test_auth_response_wire_format() {
        let auth: AuthResponse =
            serde_json::from_str(r#"{"token":"t-1","userId":"u-1"}"#).unwrap();
        assert_eq!(auth.token, "t-1");
        assert_eq!(auth.user_id, "u-1");

        let auth: AuthResponse = serde_json::from_str(r#"{"token":"t-2"}"#).unwrap();
        assert_eq!(auth.user_id, "");
    }
}
