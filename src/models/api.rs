use std::fmt;

use serde::{Deserialize, Serialize};

/// Credential class a gated route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// UI-facing key (internal status endpoint)
    Ui,
    /// Push-ingestion key (stats snapshot endpoints)
    UiPush,
}

impl KeyType {
    /// Tag sent to the authorization service.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Ui => "UI",
            KeyType::UiPush => "UIPUSH",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key record returned by the authorization service.
///
/// Both fields are optional on the wire; a record with a missing key never
/// matches a provided key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiKeyRecord {
    /// Expected key value
    #[serde(rename = "api key", default)]
    pub api_key: Option<String>,
    /// Status flag, e.g. "valid"
    #[serde(default)]
    pub api_status: Option<String>,
}

/// Response for the internal process-status endpoint.
#[derive(Debug, Serialize)]
pub struct ProcessStatusResponse {
    /// Crate version
    #[serde(rename = "clearsky UI version")]
    pub version: String,
    /// Time since startup
    pub uptime: String,
    /// Local wall-clock time
    #[serde(rename = "current time")]
    pub current_time: String,
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Serialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_tags() {
        assert_eq!(KeyType::Ui.as_str(), "UI");
        assert_eq!(KeyType::UiPush.to_string(), "UIPUSH");
    }

    #[test]
    fn test_api_key_record_deserialization() {
        let json = r#"{"api key": "K", "api_status": "valid"}"#;
        let record: ApiKeyRecord =
            serde_json::from_str(json).expect("Deserialization should succeed");

        assert_eq!(record.api_key.as_deref(), Some("K"));
        assert_eq!(record.api_status.as_deref(), Some("valid"));
    }

    #[test]
    fn test_api_key_record_missing_fields() {
        let record: ApiKeyRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, ApiKeyRecord::default());
    }

    #[test]
    fn test_process_status_serialization() {
        let response = ProcessStatusResponse {
            version: "0.1.0".to_string(),
            uptime: "0:00:01.000000".to_string(),
            current_time: "2024-01-15 10:30:00.000000".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"clearsky UI version\":\"0.1.0\""));
        assert!(json.contains("\"current time\""));
    }

    #[test]
    fn test_message_response_serialization() {
        let json = serde_json::to_string(&MessageResponse::new("Data received successfully"))
            .unwrap();
        assert_eq!(json, r#"{"message":"Data received successfully"}"#);
    }
}
