//! Acknowledgement returned to the transport after handling one event.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    Ok,
    Fail,
}

/// Outcome of processing a single inbound event.
///
/// `Ok` tells the platform not to redeliver, even when the reply itself
/// could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Ok,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Fail,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_uppercase_status() {
        let json = serde_json::to_string(&Ack::fail("Error: boom")).unwrap();
        assert_eq!(json, r#"{"status":"FAIL","message":"Error: boom"}"#);
    }

    #[test]
    fn ok_ack() {
        let ack = Ack::ok("ignored");
        assert!(ack.is_ok());
        assert_eq!(ack.message, "ignored");
    }
}
