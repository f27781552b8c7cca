//! Source to client messages

use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// Message pushed by a generator source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Yield(YieldResponse),
    GetObject(GetObjectResponse),
}

/// Resolved files for one machine
///
/// Pushed whenever the source (re)computes content, not only in reply to a
/// [`YieldRequest`](crate::YieldRequest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldResponse {
    pub hostname: String,
    pub files: Vec<FileInfo>,
}

/// Content descriptor for one generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub pathname: String,
    pub hash: Hash,
    pub length: u64,
}

/// Payload for a previously requested object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectResponse {
    pub hash: Hash,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl From<YieldResponse> for ServerMessage {
    fn from(response: YieldResponse) -> Self {
        Self::Yield(response)
    }
}

impl From<GetObjectResponse> for ServerMessage {
    fn from(response: GetObjectResponse) -> Self {
        Self::GetObject(response)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_payload_is_base64() {
        let msg = ServerMessage::GetObject(GetObjectResponse {
            hash: Hash::of(b"hi"),
            data: b"hi".to_vec(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "get_object");
        assert_eq!(json["data"], "aGk=");
    }

    #[test]
    fn test_yield_response_wire_shape() {
        let hash = Hash::of(b"content");
        let json = format!(
            r#"{{"type":"yield","hostname":"web-1","files":[{{"pathname":"/etc/motd","hash":"{hash}","length":7}}]}}"#
        );
        let msg: ServerMessage = serde_json::from_str(&json).unwrap();
        let ServerMessage::Yield(response) = msg else {
            panic!("expected yield response");
        };
        assert_eq!(response.hostname, "web-1");
        assert_eq!(response.files[0].hash, hash);
        assert_eq!(response.files[0].length, 7);
    }
}
