//! Request and response types for the line-oriented JSON interface.
//!
//! One request per line:
//!
//! ```text
//! {"id":1,"op":"derive_pubkey","service_name":"svc","random_token":"0x…"}
//! {"id":2,"op":"get_pubkey","service_name":"svc"}
//! {"id":3,"op":"encrypt","service_name":"svc","plaintext":"0x…"}
//! {"id":4,"op":"decrypt","random_token":"0x…","ciphertext":"0x…"}
//! ```
//!
//! One response per line, echoing the request id:
//!
//! ```text
//! {"id":1,"ok":{"derived_pubkey":"0x…"}}
//! {"id":2,"error":{"kind":"not_registered","message":"service not registered"}}
//! ```
//!
//! Byte fields are hex with an optional `0x` prefix. Tokens must decode to
//! exactly 32 bytes.

use keyhold_crypto::DerivationToken;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    broker::KeyBroker,
    entropy::Entropy,
    error::{BrokerError, ErrorKind},
};

/// A request with its correlation id.
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    /// Caller-chosen id echoed in the response
    pub id: u64,
    /// The operation
    #[serde(flatten)]
    pub request: Request,
}

/// Broker operations.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Derive and publish a service key
    DerivePubkey {
        /// Service identity
        service_name: String,
        /// 32-byte derivation token
        #[serde(with = "hex_bytes")]
        random_token: Vec<u8>,
    },
    /// Look up a published key
    GetPubkey {
        /// Service identity
        service_name: String,
    },
    /// Encrypt to a published key
    Encrypt {
        /// Service identity
        service_name: String,
        /// Data to encrypt
        #[serde(with = "hex_bytes")]
        plaintext: Vec<u8>,
    },
    /// Decrypt with a token
    Decrypt {
        /// 32-byte derivation token
        #[serde(with = "hex_bytes")]
        random_token: Vec<u8>,
        /// ECIES ciphertext
        #[serde(with = "hex_bytes")]
        ciphertext: Vec<u8>,
    },
}

/// A response with the id of the request it answers.
#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    /// Request id, or `null` if the line could not be parsed far enough
    pub id: Option<u64>,
    /// Result of the operation
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Success or failure of a request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Operation succeeded
    Ok(Reply),
    /// Operation was rejected
    Error(ErrorBody),
}

/// Successful operation payloads.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// From `derive_pubkey` and `get_pubkey`
    DerivedPubkey {
        /// 33-byte compressed public key
        #[serde(with = "hex_bytes")]
        derived_pubkey: Vec<u8>,
    },
    /// From `encrypt`
    Ciphertext {
        /// ECIES ciphertext
        #[serde(with = "hex_bytes")]
        ciphertext: Vec<u8>,
    },
    /// From `decrypt`
    Plaintext {
        /// Recovered data
        #[serde(with = "hex_bytes")]
        plaintext: Vec<u8>,
    },
}

/// Rejected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind
    pub kind: &'static str,
    /// Human-readable message
    pub message: String,
}

impl ErrorBody {
    /// Error for a malformed request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::BadRequest.as_str(), message: message.into() }
    }
}

impl From<BrokerError> for ErrorBody {
    fn from(err: BrokerError) -> Self {
        Self { kind: err.kind().as_str(), message: err.to_string() }
    }
}

impl ResponseEnvelope {
    /// Error response for request `id`.
    pub fn error(id: Option<u64>, body: ErrorBody) -> Self {
        Self { id, outcome: Outcome::Error(body) }
    }
}

/// Parse one request line, run it, and build the response.
///
/// Never fails: malformed input yields a `bad_request` response.
pub fn handle_line<E: Entropy>(broker: &KeyBroker<E>, line: &str) -> ResponseEnvelope {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return ResponseEnvelope::error(None, ErrorBody::bad_request(e.to_string())),
    };
    let id = value.get("id").and_then(serde_json::Value::as_u64);

    let envelope: RequestEnvelope = match serde_json::from_value(value) {
        Ok(envelope) => envelope,
        Err(e) => return ResponseEnvelope::error(id, ErrorBody::bad_request(e.to_string())),
    };

    let outcome = match dispatch(broker, envelope.request) {
        Ok(reply) => Outcome::Ok(reply),
        Err(body) => Outcome::Error(body),
    };

    ResponseEnvelope { id: Some(envelope.id), outcome }
}

/// Run a parsed request against the broker.
pub fn dispatch<E: Entropy>(broker: &KeyBroker<E>, request: Request) -> Result<Reply, ErrorBody> {
    match request {
        Request::DerivePubkey { service_name, random_token } => {
            let token = parse_token(random_token)?;
            let key = broker.derive_pubkey(&service_name, &token)?;
            Ok(Reply::DerivedPubkey { derived_pubkey: key.to_vec() })
        },
        Request::GetPubkey { service_name } => {
            let key = broker.get_pubkey(&service_name)?;
            Ok(Reply::DerivedPubkey { derived_pubkey: key.to_vec() })
        },
        Request::Encrypt { service_name, plaintext } => {
            let plaintext = Zeroizing::new(plaintext);
            let ciphertext = broker.encrypt(&service_name, &plaintext)?;
            Ok(Reply::Ciphertext { ciphertext })
        },
        Request::Decrypt { random_token, ciphertext } => {
            let token = parse_token(random_token)?;
            let plaintext = broker.decrypt(&token, &ciphertext)?;
            Ok(Reply::Plaintext { plaintext })
        },
    }
}

fn parse_token(bytes: Vec<u8>) -> Result<DerivationToken, ErrorBody> {
    let bytes = Zeroizing::new(bytes);
    DerivationToken::try_from(bytes.as_slice()).map_err(|e| ErrorBody::bad_request(e.to_string()))
}

/// Hex serde helpers for byte fields.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<T: AsRef<[u8]>, S: Serializer>(
        bytes: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use keyhold_crypto::RootSecret;
    use serde_json::{Value, json};

    use super::*;
    use crate::entropy::SystemEntropy;

    fn broker() -> KeyBroker {
        let root = RootSecret::from_bytes(b"request_test_root_secret_32bytes".to_vec()).unwrap();
        KeyBroker::new(root, SystemEntropy::new())
    }

    fn run(broker: &KeyBroker, request: &Value) -> Value {
        serde_json::to_value(handle_line(broker, &request.to_string())).unwrap()
    }

    fn token_hex(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    #[test]
    fn derive_then_get_returns_same_key() {
        let broker = broker();

        let derived = run(
            &broker,
            &json!({"id": 1, "op": "derive_pubkey", "service_name": "svc", "random_token": token_hex(1)}),
        );
        let fetched = run(&broker, &json!({"id": 2, "op": "get_pubkey", "service_name": "svc"}));

        assert_eq!(derived["id"], 1);
        assert_eq!(fetched["id"], 2);
        assert_eq!(derived["ok"]["derived_pubkey"], fetched["ok"]["derived_pubkey"]);

        let encoded = derived["ok"]["derived_pubkey"].as_str().unwrap();
        assert_eq!(encoded.len(), 2 + 2 * 33);
    }

    #[test]
    fn encrypt_decrypt_through_json() {
        let broker = broker();
        run(
            &broker,
            &json!({"id": 1, "op": "derive_pubkey", "service_name": "svc", "random_token": token_hex(2)}),
        );

        let encrypted = run(
            &broker,
            &json!({"id": 2, "op": "encrypt", "service_name": "svc", "plaintext": "0xdeadbeef"}),
        );
        let ciphertext = encrypted["ok"]["ciphertext"].as_str().unwrap();

        let decrypted = run(
            &broker,
            &json!({"id": 3, "op": "decrypt", "random_token": token_hex(2), "ciphertext": ciphertext}),
        );

        assert_eq!(decrypted["ok"]["plaintext"], "0xdeadbeef");
    }

    #[test]
    fn hex_without_prefix_is_accepted() {
        let broker = broker();
        let response = run(
            &broker,
            &json!({"id": 1, "op": "derive_pubkey", "service_name": "svc", "random_token": hex::encode([3u8; 32])}),
        );
        assert!(response.get("ok").is_some());
    }

    #[test]
    fn errors_carry_kind_and_message() {
        let broker = broker();

        let response = run(&broker, &json!({"id": 9, "op": "get_pubkey", "service_name": "nope"}));

        assert_eq!(response["id"], 9);
        assert_eq!(response["error"]["kind"], "not_registered");
        assert_eq!(response["error"]["message"], "service not registered");
    }

    #[test]
    fn duplicate_registration_reports_already_registered() {
        let broker = broker();
        let request =
            json!({"id": 1, "op": "derive_pubkey", "service_name": "svc", "random_token": token_hex(4)});

        run(&broker, &request);
        let second = run(&broker, &request);

        assert_eq!(second["error"]["kind"], "already_registered");
        assert_eq!(second["error"]["message"], "already registered");
    }

    #[test]
    fn wrong_token_length_is_bad_request() {
        let broker = broker();
        let response = run(
            &broker,
            &json!({"id": 5, "op": "derive_pubkey", "service_name": "svc", "random_token": "0x0011"}),
        );

        assert_eq!(response["id"], 5);
        assert_eq!(response["error"]["kind"], "bad_request");
        assert!(broker.registry().is_empty());
    }

    #[test]
    fn garbage_ciphertext_is_decryption_error() {
        let broker = broker();
        let response = run(
            &broker,
            &json!({"id": 6, "op": "decrypt", "random_token": token_hex(5), "ciphertext": "0x00"}),
        );

        assert_eq!(response["error"]["kind"], "decryption");
        assert_eq!(response["error"]["message"], "could not decrypt");
    }

    #[test]
    fn unparseable_line_has_null_id() {
        let broker = broker();
        let response = serde_json::to_value(handle_line(&broker, "{not json")).unwrap();

        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["kind"], "bad_request");
    }

    #[test]
    fn unknown_op_keeps_id() {
        let broker = broker();
        let response = run(&broker, &json!({"id": 7, "op": "rotate_key", "service_name": "svc"}));

        assert_eq!(response["id"], 7);
        assert_eq!(response["error"]["kind"], "bad_request");
    }

    #[test]
    fn invalid_hex_is_bad_request() {
        let broker = broker();
        let response = run(
            &broker,
            &json!({"id": 8, "op": "encrypt", "service_name": "svc", "plaintext": "0xzz"}),
        );

        assert_eq!(response["error"]["kind"], "bad_request");
    }
}
