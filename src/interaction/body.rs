//! Body encoding inside cassette documents
//!
//! UTF-8 bodies are stored as readable text; anything else is hex encoded.

use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const UTF8: &str = "UTF-8";
const BINARY: &str = "ASCII-8BIT";

#[derive(Serialize, Deserialize)]
struct EncodedBody {
    encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hex_string: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBody {
    Plain(String),
    Encoded(EncodedBody),
}

pub(crate) fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let encoded = match std::str::from_utf8(body) {
        Ok(text) => EncodedBody {
            encoding: UTF8.to_string(),
            string: Some(text.to_string()),
            hex_string: None,
        },
        Err(_) => EncodedBody {
            encoding: BINARY.to_string(),
            string: None,
            hex_string: Some(hex::encode(body)),
        },
    };
    encoded.serialize(serializer)
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    match Option::<StoredBody>::deserialize(deserializer)? {
        None => Ok(Bytes::new()),
        Some(StoredBody::Plain(text)) => Ok(Bytes::from(text)),
        Some(StoredBody::Encoded(EncodedBody {
            hex_string: Some(hex_string),
            ..
        })) => hex::decode(hex_string)
            .map(Bytes::from)
            .map_err(D::Error::custom),
        Some(StoredBody::Encoded(EncodedBody { string, .. })) => {
            Ok(Bytes::from(string.unwrap_or_default()))
        }
    }
}
