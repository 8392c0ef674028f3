//! System key management.
//!
//! The system/service keypair is process-wide state with a defined
//! lifecycle: loaded once at startup from the environment (strict in
//! production), or generated ephemerally with a warning in development.
//! Construct one `SigningService` at startup and share it; it is never
//! re-initialized mid-process.
//!
//! Editor keys are different: each editor holds their own private key and
//! the ledger only ever stores the public half. Private keys are never
//! persisted by the core.

use tracing::{info, warn};

use crate::error::SignerError;
use crate::keys::{generate_keypair, sign, verify};

/// Environment variable holding the base64 system private key.
pub const SYSTEM_PRIVATE_KEY_VAR: &str = "SYSTEM_PRIVATE_KEY";
/// Environment variable holding the base64 system public key.
pub const SYSTEM_PUBLIC_KEY_VAR: &str = "SYSTEM_PUBLIC_KEY";
/// Environment variable toggling strict production mode.
pub const PRODUCTION_VAR: &str = "PRODUCTION";

/// An Ed25519 keypair, both halves base64-encoded.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// Manages the system signing key.
///
/// Private keys never appear in logs or errors; validation happens by a
/// sign/verify round trip, not by comparing key material.
pub struct SigningService {
    keypair: KeyPair,
    ephemeral: bool,
}

impl SigningService {
    /// Load the system keypair from the environment.
    ///
    /// Both `SYSTEM_PRIVATE_KEY` and `SYSTEM_PUBLIC_KEY` set: validate and
    /// use them. Neither set: in production this is a hard error; in
    /// development an ephemeral pair is generated and a warning emitted —
    /// the key changes on every restart.
    pub fn from_env() -> Result<SigningService, SignerError> {
        let private = std::env::var(SYSTEM_PRIVATE_KEY_VAR).unwrap_or_default();
        let public = std::env::var(SYSTEM_PUBLIC_KEY_VAR).unwrap_or_default();

        if !private.is_empty() && !public.is_empty() {
            let service = Self::from_keypair(KeyPair {
                private_key: private,
                public_key: public,
            })?;
            info!("system signing key loaded from environment");
            return Ok(service);
        }

        if is_production() {
            return Err(SignerError::MissingSystemKey);
        }

        warn!(
            "system signing key not configured; generating an ephemeral keypair. \
             The key changes on every restart — not suitable for production"
        );
        let (private_key, public_key) = generate_keypair();
        Ok(SigningService {
            keypair: KeyPair {
                private_key,
                public_key,
            },
            ephemeral: true,
        })
    }

    /// Build a service from an explicit keypair, validating it with a
    /// sign/verify round trip.
    pub fn from_keypair(keypair: KeyPair) -> Result<SigningService, SignerError> {
        let probe = "keypair-validation-test";
        let signature = sign(probe, &keypair.private_key)?;
        if !verify(probe, &signature, &keypair.public_key) {
            return Err(SignerError::KeypairMismatch);
        }
        Ok(SigningService {
            keypair,
            ephemeral: false,
        })
    }

    /// The system public key. Safe to expose.
    pub fn system_public_key(&self) -> &str {
        &self.keypair.public_key
    }

    /// Whether the key was generated at startup rather than configured.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Sign a message with the system key (system-generated events, bootstrap
    /// registration).
    pub fn sign_with_system_key(&self, message: &str) -> Result<String, SignerError> {
        sign(message, &self.keypair.private_key)
    }

    /// Verify a signature made with the system key.
    pub fn verify_system_signature(&self, message: &str, signature: &str) -> bool {
        verify(message, signature, &self.keypair.public_key)
    }

    /// The full keypair, for registering the system editor at initial setup.
    pub fn system_keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

fn is_production() -> bool {
    std::env::var(PRODUCTION_VAR)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
