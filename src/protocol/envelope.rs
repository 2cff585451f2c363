//! Outbound message envelope
//!
//! Every server → connection message is a JSON text frame of the form
//! `{"status": <code>, "data": <records | message>}`.

use serde::Serialize;

use crate::registry::ServiceRecord;

/// Numeric response codes carried in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// 200
    Ok,
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
}

impl ResponseStatus {
    /// Numeric value
    pub fn code(self) -> u16 {
        match self {
            ResponseStatus::Ok => 200,
            ResponseStatus::BadRequest => 400,
            ResponseStatus::Unauthorized => 401,
        }
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// Envelope payload
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload<'a> {
    /// Full record listing
    Records(&'a [ServiceRecord]),
    /// Plain message, usually an error
    Message(&'a str),
}

/// Server → connection message
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a> {
    pub status: ResponseStatus,
    pub data: Payload<'a>,
}

impl<'a> Envelope<'a> {
    /// `200` with the full listing
    pub fn listing(records: &'a [ServiceRecord]) -> Self {
        Self {
            status: ResponseStatus::Ok,
            data: Payload::Records(records),
        }
    }

    /// Message with the given status
    pub fn message(status: ResponseStatus, message: &'a str) -> Self {
        Self {
            status,
            data: Payload::Message(message),
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_envelope() {
        let records = vec![ServiceRecord::http_endpoint("c1", "svc-a", "10.0.0.1", 8080)];
        let json = Envelope::listing(&records).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], 200);
        assert_eq!(value["data"][0]["name"], "svc-a");
        assert_eq!(value["data"][0]["status"], "UP");
    }

    #[test]
    fn test_empty_listing_is_array() {
        let json = Envelope::listing(&[]).to_json().unwrap();
        assert_eq!(json, r#"{"status":200,"data":[]}"#);
    }

    #[test]
    fn test_message_envelope() {
        let json = Envelope::message(ResponseStatus::Unauthorized, "Invalid Token!")
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"status":401,"data":"Invalid Token!"}"#);
    }
}
