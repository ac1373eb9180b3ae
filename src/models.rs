use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub vorname: String,
    pub nachname: String,
}

/// Body of create and update requests. Fields are raw JSON so that only an
/// absent, `null` or empty name counts as missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub vorname: Option<Value>,
    #[serde(default)]
    pub nachname: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserName {
    pub vorname: String,
    pub nachname: String,
}

pub const NAMES_REQUIRED: &str = "Vorname und Nachname sind erforderlich";

impl UserPayload {
    pub fn into_name(self) -> AppResult<UserName> {
        match (present(self.vorname), present(self.nachname)) {
            (Some(vorname), Some(nachname)) => Ok(UserName { vorname, nachname }),
            _ => Err(AppError::Validation(NAMES_REQUIRED.to_string())),
        }
    }
}

fn present(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        // Numbers, booleans and the like are kept as their JSON text.
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::UserPayload;
    use crate::errors::AppError;

    #[test]
    fn payload_with_both_names_is_accepted() {
        let payload: UserPayload =
            serde_json::from_str(r#"{"vorname":"Anna","nachname":"Muller"}"#).expect("parse");
        let name = payload.into_name().expect("valid");
        assert_eq!(name.vorname, "Anna");
        assert_eq!(name.nachname, "Muller");
    }

    #[test]
    fn missing_null_or_empty_names_are_rejected() {
        for body in [
            r#"{"vorname":"Anna"}"#,
            r#"{"nachname":"Muller"}"#,
            r#"{"vorname":null,"nachname":"Muller"}"#,
            r#"{"vorname":"","nachname":"Muller"}"#,
            r#"{}"#,
        ] {
            let payload: UserPayload = serde_json::from_str(body).expect("parse");
            assert!(
                matches!(payload.into_name(), Err(AppError::Validation(_))),
                "expected rejection for {body}"
            );
        }
    }

    #[test]
    fn present_names_are_not_validated_further() {
        let payload: UserPayload =
            serde_json::from_str(r#"{"vorname":"  ","nachname":7}"#).expect("parse");
        let name = payload.into_name().expect("accepted");
        assert_eq!(name.vorname, "  ");
        assert_eq!(name.nachname, "7");
    }
}
