//! Connect handshake authentication — the signed device payload
//!
//! The signed payload is the pipe-joined concatenation
//! `version|deviceId|clientId|clientMode|role|scopes,joined|signedAtMs|token|nonce?`
//! where version is `v2` when the gateway issued a challenge nonce and `v1`
//! otherwise. The signature travels base64url (no padding) next to the raw
//! public key in the `device` section of the connect request.

use crate::identity::DeviceIdentity;
use serde_json::{json, Value};

/// Client-describing fields that participate in the signature and the
/// connect frame.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: String,
    pub mode: String,
    pub role: String,
    pub scopes: Vec<String>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            id: "clawdini".into(),
            mode: "backend".into(),
            role: "operator".into(),
            scopes: Vec::new(),
        }
    }
}

/// Build the exact byte string the device signs.
pub fn signed_payload(
    device_id: &str,
    client: &ClientInfo,
    signed_at_ms: u64,
    token: Option<&str>,
    nonce: Option<&str>,
) -> String {
    let version = if nonce.is_some() { "v2" } else { "v1" };
    let mut payload = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        version,
        device_id,
        client.id,
        client.mode,
        client.role,
        client.scopes.join(","),
        signed_at_ms,
        token.unwrap_or(""),
    );
    if let Some(nonce) = nonce {
        payload.push('|');
        payload.push_str(nonce);
    }
    payload
}

/// The `device` section of the connect request.
pub fn device_section(
    identity: &DeviceIdentity,
    client: &ClientInfo,
    signed_at_ms: u64,
    token: Option<&str>,
    nonce: Option<&str>,
) -> Value {
    let payload = signed_payload(identity.device_id(), client, signed_at_ms, token, nonce);
    let mut device = json!({
        "id": identity.device_id(),
        "publicKey": identity.public_key_b64(),
        "signature": identity.sign_b64(&payload),
        "signedAt": signed_at_ms,
    });
    if let Some(nonce) = nonce {
        device["nonce"] = json!(nonce);
    }
    device
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClientInfo {
        ClientInfo {
            id: "clawdini".into(),
            mode: "backend".into(),
            role: "operator".into(),
            scopes: vec!["operator".into(), "chat".into()],
        }
    }

    #[test]
    fn v2_payload_with_nonce() {
        let payload = signed_payload("dev-1", &client(), 1700000000000, Some("tok"), Some("n0nce"));
        assert_eq!(
            payload,
            "v2|dev-1|clawdini|backend|operator|operator,chat|1700000000000|tok|n0nce"
        );
    }

    #[test]
    fn v1_payload_without_nonce() {
        let payload = signed_payload("dev-1", &client(), 1700000000000, None, None);
        assert_eq!(
            payload,
            "v1|dev-1|clawdini|backend|operator|operator,chat|1700000000000|"
        );
    }

    #[test]
    fn device_section_shape() {
        let dir = tempfile::tempdir().unwrap();
        let identity =
            crate::identity::DeviceIdentity::load_or_generate(&dir.path().join("d.json")).unwrap();

        let section = device_section(&identity, &client(), 42, Some("tok"), Some("abc"));
        assert_eq!(section["id"], identity.device_id());
        assert_eq!(section["nonce"], "abc");
        assert!(section["signature"].as_str().is_some_and(|s| !s.is_empty()));
        // base64url, no padding
        let sig = section["signature"].as_str().unwrap();
        assert!(!sig.contains('='));
        assert!(!sig.contains('+'));

        let without_nonce = device_section(&identity, &client(), 42, Some("tok"), None);
        assert!(without_nonce.get("nonce").is_none());
    }
}
