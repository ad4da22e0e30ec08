/// Unified interface for payload signers
use crate::error::Result;

/// Signer trait
///
/// A payload signer produces *attached* signed messages: the signature and
/// the payload travel together, and `open` both verifies the signature and
/// recovers the original payload bytes. Verification never succeeds without
/// yielding the payload.
pub trait Signer {
    /// Generate keypair
    fn generate_keypair(&mut self) -> Result<()>;

    /// Sign a payload, returning the attached signed message
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signed message and recover the embedded payload
    fn open(&self, signed: &[u8]) -> Result<Vec<u8>>;

    /// Get public key
    fn public_key(&self) -> &[u8];

    /// Algorithm name
    fn algorithm_name(&self) -> &str;
}
