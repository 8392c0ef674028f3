//! Ed25519 keypair generation, signing, and verification.
//!
//! Keys and signatures travel as base64 strings. The signed message for
//! ledger events is the lowercase hex `event_hash` *string* — the hex text
//! itself, not its decoded bytes. Verifiers in any language must preserve
//! this exactly; it is a load-bearing compatibility detail for existing
//! bundles.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::SignerError;

/// The fixed challenge used for key-binding checks.
///
/// Signing this string and verifying against a registered public key proves
/// possession of the matching private key. The challenge does not need to be
/// random — it verifies key correspondence, not replay freshness. The value
/// is carried verbatim from the original deployment so existing ledgers keep
/// verifying.
pub const KEY_BINDING_CHALLENGE: &str = "accountabilityme-key-verification-challenge-v1";

/// Generate a new Ed25519 keypair from the OS cryptographic RNG.
///
/// Returns `(private_key_b64, public_key_b64)`.
pub fn generate_keypair() -> (String, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (
        BASE64.encode(signing_key.to_bytes()),
        BASE64.encode(verifying_key.to_bytes()),
    )
}

/// Sign a message string with a base64-encoded private key.
///
/// The signature is computed over the UTF-8 bytes of `message` and returned
/// base64-encoded.
pub fn sign(message: &str, private_key_b64: &str) -> Result<String, SignerError> {
    let key_bytes = decode_key::<32>(private_key_b64)?;
    let signing_key = SigningKey::from_bytes(&key_bytes);
    let signature = signing_key.sign(message.as_bytes());
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify an Ed25519 signature.
///
/// Returns `false` for any malformed key, malformed signature, or signature
/// mismatch — verification never panics and never distinguishes *why* it
/// failed to the caller.
pub fn verify(message: &str, signature_b64: &str, public_key_b64: &str) -> bool {
    let Ok(key_bytes) = decode_key::<32>(public_key_b64) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = decode_key::<64>(signature_b64) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// Decode base64 key material into a fixed-size array.
fn decode_key<const N: usize>(encoded: &str) -> Result<[u8; N], SignerError> {
    let bytes = BASE64.decode(encoded)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SignerError::InvalidKeyLength { expected: N, actual })
}
