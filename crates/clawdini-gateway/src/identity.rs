//! Persistent device identity — an Ed25519 keypair on disk
//!
//! The gateway authenticates devices, not processes: the keypair lives at a
//! well-known path and survives restarts so server-side grants stick to this
//! installation. The device id is the lowercase hex SHA-256 of the raw
//! 32-byte public key (not of the SPKI DER document the PEM encodes).

use base64::Engine;
use chrono::Utc;
use clawdini_core::{Error, Result};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use pkcs8::LineEnding;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

/// On-disk schema for the identity file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    version: u32,
    device_id: String,
    public_key_pem: String,
    private_key_pem: String,
    created_at_ms: i64,
}

/// A loaded device identity, ready to sign connect challenges.
pub struct DeviceIdentity {
    device_id: String,
    signing_key: SigningKey,
}

impl DeviceIdentity {
    /// Load the identity at `path`, generating and persisting a fresh one if
    /// the file does not exist. If the stored id disagrees with the hash of
    /// the stored public key (older schema), the id is rewritten in place —
    /// the keys are kept, since rotating them would re-authenticate as a new
    /// device and drop any server-side grants.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Self::generate(path);
        }

        let raw = std::fs::read_to_string(path)?;
        let file: IdentityFile = serde_json::from_str(&raw)
            .map_err(|e| Error::auth(format!("unreadable identity file: {}", e)))?;

        let signing_key = SigningKey::from_pkcs8_pem(&file.private_key_pem)
            .map_err(|e| Error::auth(format!("bad private key in identity file: {}", e)))?;
        let computed_id = device_id_for(&signing_key);

        if computed_id != file.device_id {
            warn!(
                "identity file device id {} does not match public key, healing to {}",
                file.device_id, computed_id
            );
            let healed = IdentityFile {
                device_id: computed_id.clone(),
                ..file
            };
            write_identity_file(path, &healed)?;
        }

        Ok(Self {
            device_id: computed_id,
            signing_key,
        })
    }

    fn generate(path: &Path) -> Result<Self> {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let device_id = device_id_for(&signing_key);

        let private_key_pem = signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::auth(format!("pkcs8 encode failed: {}", e)))?
            .to_string();
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::auth(format!("spki encode failed: {}", e)))?;

        let file = IdentityFile {
            version: 1,
            device_id: device_id.clone(),
            public_key_pem,
            private_key_pem,
            created_at_ms: Utc::now().timestamp_millis(),
        };
        write_identity_file(path, &file)?;
        info!("generated device identity {} at {}", device_id, path.display());

        Ok(Self {
            device_id,
            signing_key,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Raw 32-byte public key, base64url without padding — the form the
    /// connect frame carries.
    pub fn public_key_b64(&self) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `payload` with the device key; base64url without padding.
    pub fn sign_b64(&self, payload: &str) -> String {
        let signature = self.signing_key.sign(payload.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature.to_bytes())
    }
}

fn device_id_for(signing_key: &SigningKey) -> String {
    hex::encode(Sha256::digest(signing_key.verifying_key().to_bytes()))
}

fn write_identity_file(path: &Path, file: &IdentityFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(file)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
