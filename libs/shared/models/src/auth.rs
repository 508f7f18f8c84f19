use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Application role, preferring `app_metadata.role` over the top-level claim.
    /// Identity providers put their own values (e.g. "authenticated") in `role`,
    /// so anything unrecognised falls back to patient.
    pub fn application_role(&self) -> Role {
        self.app_metadata
            .as_ref()
            .and_then(|meta| meta.get("role"))
            .and_then(|role| role.as_str())
            .or(self.role.as_deref())
            .and_then(|role| role.parse().ok())
            .unwrap_or(Role::Patient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity of the caller, taken from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
    pub issued_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(role: Option<&str>, app_metadata: Option<serde_json::Value>) -> JwtClaims {
        JwtClaims {
            sub: "user-1".to_string(),
            exp: None,
            email: None,
            role: role.map(str::to_string),
            app_metadata,
            aud: None,
            iat: None,
        }
    }

    #[test]
    fn app_metadata_role_wins() {
        let c = claims(Some("authenticated"), Some(json!({ "role": "doctor" })));
        assert_eq!(c.application_role(), Role::Doctor);
    }

    #[test]
    fn unknown_role_defaults_to_patient() {
        assert_eq!(claims(Some("authenticated"), None).application_role(), Role::Patient);
        assert_eq!(claims(None, None).application_role(), Role::Patient);
        assert_eq!(claims(Some("admin"), None).application_role(), Role::Admin);
    }
}
