//! Dilithium3 attached-signature implementation
//!
//! Dilithium is one of the digital signature schemes selected in the NIST
//! post-quantum cryptography standardization competition (FIPS 204). We use
//! the Level 3 parameter set (equivalent to AES-192): proof submissions are
//! retained and re-verified long after the round that produced them, so the
//! signature scheme has to stay sound over that horizon.
//!
//! # Attached vs detached
//!
//! `pqcrypto`'s `sign` produces a `SignedMessage` of the form
//! `[signature] + [payload]`, and `open` verifies it and returns the payload.
//! The audit protocol relies on exactly this: a verifier holds only the
//! signed blob plus a claimed public key, and must recover the signed payload
//! to compare against the claim. We therefore keep the message attached
//! instead of splitting off a detached signature.
//!
//! | Parameter | Size |
//! |-----------|------|
//! | Public key | 1,952 bytes |
//! | Secret key | 4,032 bytes |
//! | Signature overhead | ~3,309 bytes |

use crate::error::{Result, SignerError};
use crate::traits::Signer;
use base64::{engine::general_purpose, Engine as _};
use pqcrypto_dilithium::dilithium3;
use pqcrypto_traits::sign::{PublicKey, SecretKey, SignedMessage};

/// Dilithium3 payload signer
///
/// # Example
///
/// ```rust
/// use payload_signer::dilithium::Dilithium3Signer;
/// use payload_signer::traits::Signer;
///
/// // Generate keypair
/// let mut signer = Dilithium3Signer::new();
/// signer.generate_keypair().unwrap();
///
/// // Sign payload
/// let payload = br#"{"cid":"bafybeigdyrzt5s"}"#;
/// let signed = signer.sign(payload).unwrap();
///
/// // Verify and recover payload
/// let recovered = signer.open(&signed).unwrap();
/// assert_eq!(recovered, payload);
/// ```
#[derive(Clone)]
pub struct Dilithium3Signer {
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl Dilithium3Signer {
    /// Create new Dilithium3 signer (keys not initialized)
    ///
    /// Must call `generate_keypair()` or `from_bytes()` to initialize keys
    pub fn new() -> Self {
        Self {
            public_key: Vec::new(),
            secret_key: Vec::new(),
        }
    }

    /// Restore keypair from bytes
    ///
    /// # Parameters
    /// - `public_key`: Public key bytes (1952 bytes)
    /// - `secret_key`: Secret key bytes (4032 bytes)
    ///
    /// # Errors
    /// - Returns `KeyGeneration` if either key length is incorrect
    pub fn from_bytes(public_key: &[u8], secret_key: &[u8]) -> Result<Self> {
        if public_key.len() != dilithium3::public_key_bytes() {
            return Err(SignerError::KeyGeneration(format!(
                "Invalid public key length: expected {} bytes, got {}",
                dilithium3::public_key_bytes(),
                public_key.len()
            )));
        }

        if secret_key.len() != dilithium3::secret_key_bytes() {
            return Err(SignerError::KeyGeneration(format!(
                "Invalid secret key length: expected {} bytes, got {}",
                dilithium3::secret_key_bytes(),
                secret_key.len()
            )));
        }

        Ok(Self {
            public_key: public_key.to_vec(),
            secret_key: secret_key.to_vec(),
        })
    }

    /// Create a verification-only signer from a public key
    ///
    /// The resulting signer can `open` signed messages but any call to
    /// `sign` fails. Used by auditors, which hold only the submitter's
    /// public key.
    ///
    /// # Errors
    /// - Returns `KeyGeneration` if the public key length or format is invalid
    pub fn from_public_key_only(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != dilithium3::public_key_bytes() {
            return Err(SignerError::KeyGeneration(format!(
                "Invalid public key length: expected {} bytes, got {}",
                dilithium3::public_key_bytes(),
                public_key.len()
            )));
        }

        // 驗證公鑰格式（嘗試反序列化）
        dilithium3::PublicKey::from_bytes(public_key).map_err(|e| {
            SignerError::KeyGeneration(format!(
                "Invalid public key format (failed to deserialize): {:?}",
                e
            ))
        })?;

        tracing::debug!(
            "Created verification-only Dilithium3Signer: pk_len={} bytes (sk=empty)",
            public_key.len()
        );

        Ok(Self {
            public_key: public_key.to_vec(),
            secret_key: Vec::new(),
        })
    }

    /// Create a verification-only signer from a hex-encoded public key
    pub fn from_public_key_hex(public_key_hex: &str) -> Result<Self> {
        let public_key = hex::decode(public_key_hex)
            .map_err(|e| SignerError::Encoding(format!("Invalid hex public key: {}", e)))?;
        Self::from_public_key_only(&public_key)
    }

    /// Get secret key bytes (for persistence)
    ///
    /// # Security Warning
    /// Private keys should be stored securely, not transmitted over network or logged
    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }

    /// Public key as a hex string, the wire representation used in proofs
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    /// Sign a payload and return the signed message base64-encoded
    pub fn sign_base64(&self, payload: &[u8]) -> Result<String> {
        let signed = self.sign(payload)?;
        Ok(general_purpose::STANDARD.encode(signed))
    }

    /// Verify a base64-encoded signed message and recover the payload
    pub fn open_base64(&self, signed_b64: &str) -> Result<Vec<u8>> {
        let signed = general_purpose::STANDARD
            .decode(signed_b64)
            .map_err(|e| SignerError::Encoding(format!("Invalid base64 signature: {}", e)))?;
        self.open(&signed)
    }
}

impl Default for Dilithium3Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for Dilithium3Signer {
    /// Generate new Dilithium3 keypair
    fn generate_keypair(&mut self) -> Result<()> {
        let (pk, sk) = dilithium3::keypair();

        self.public_key = pk.as_bytes().to_vec();
        self.secret_key = sk.as_bytes().to_vec();

        tracing::info!(
            "Generated Dilithium3 keypair: pk_len={} bytes, sk_len={} bytes",
            self.public_key.len(),
            self.secret_key.len()
        );

        Ok(())
    }

    /// Sign a payload with Dilithium3
    ///
    /// # Returns
    /// - Attached signed message `[signature] + [payload]`
    ///
    /// # Errors
    /// - Returns `Signing` if keys are not initialized or malformed
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if self.secret_key.is_empty() {
            return Err(SignerError::Signing(
                "Secret key not initialized. Call generate_keypair() first.".to_string(),
            ));
        }

        // 從字節重建私鑰
        let sk = dilithium3::SecretKey::from_bytes(&self.secret_key)
            .map_err(|e| SignerError::Signing(format!("Failed to parse secret key: {:?}", e)))?;

        let signed_message = dilithium3::sign(payload, &sk);
        let signed_bytes = signed_message.as_bytes().to_vec();

        tracing::debug!(
            "Signed payload: payload_len={} bytes, signed_len={} bytes",
            payload.len(),
            signed_bytes.len()
        );

        Ok(signed_bytes)
    }

    /// Verify a signed message and recover the embedded payload
    ///
    /// # Returns
    /// - `Ok(payload)`: signature is valid, payload recovered
    /// - `Err(Verification)`: signature is invalid or the blob is malformed
    ///
    /// # Note
    /// Verification only requires the public key, so it works on
    /// verification-only signers created via `from_public_key_only`.
    fn open(&self, signed: &[u8]) -> Result<Vec<u8>> {
        if self.public_key.is_empty() {
            return Err(SignerError::Verification(
                "Public key not initialized".to_string(),
            ));
        }

        let pk = dilithium3::PublicKey::from_bytes(&self.public_key).map_err(|e| {
            SignerError::Verification(format!("Failed to parse public key: {:?}", e))
        })?;

        let signed_msg = dilithium3::SignedMessage::from_bytes(signed).map_err(|e| {
            SignerError::Verification(format!("Malformed signed message: {:?}", e))
        })?;

        dilithium3::open(&signed_msg, &pk)
            .map_err(|e| SignerError::Verification(format!("Signature rejected: {:?}", e)))
    }

    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn algorithm_name(&self) -> &str {
        "Dilithium3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_open_roundtrip() {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();

        let payload = br#"{"cid":"bafybeigdyrzt5s"}"#;
        let signed = signer.sign(payload).unwrap();
        assert!(signed.len() > payload.len());

        let recovered = signer.open(&signed).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_open_rejects_tampered_message() {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();

        let mut signed = signer.sign(b"original payload").unwrap();
        // 翻轉 payload 部分的一個位
        let last = signed.len() - 1;
        signed[last] ^= 0x01;

        assert!(signer.open(&signed).is_err());
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let mut signer_a = Dilithium3Signer::new();
        signer_a.generate_keypair().unwrap();
        let mut signer_b = Dilithium3Signer::new();
        signer_b.generate_keypair().unwrap();

        let signed = signer_a.sign(b"payload").unwrap();
        assert!(signer_b.open(&signed).is_err());
    }

    #[test]
    fn test_sign_without_keys_fails() {
        let signer = Dilithium3Signer::new();
        assert!(signer.sign(b"payload").is_err());
    }

    #[test]
    fn test_verification_only_signer() {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();
        let signed = signer.sign(b"payload").unwrap();

        let verifier = Dilithium3Signer::from_public_key_only(signer.public_key()).unwrap();
        assert_eq!(verifier.open(&signed).unwrap(), b"payload");
        assert!(verifier.sign(b"payload").is_err());
    }

    #[test]
    fn test_from_bytes_rejects_bad_lengths() {
        assert!(Dilithium3Signer::from_bytes(&[0u8; 10], &[0u8; 10]).is_err());
        assert!(Dilithium3Signer::from_public_key_only(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_base64_roundtrip() {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();

        let signed_b64 = signer.sign_base64(b"payload").unwrap();
        let recovered = signer.open_base64(&signed_b64).unwrap();
        assert_eq!(recovered, b"payload");

        assert!(signer.open_base64("not-base64!!!").is_err());
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();

        let verifier = Dilithium3Signer::from_public_key_hex(&signer.public_key_hex()).unwrap();
        let signed = signer.sign(b"payload").unwrap();
        assert_eq!(verifier.open(&signed).unwrap(), b"payload");
    }
}
