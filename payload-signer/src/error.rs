/// Error type definitions
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature verification failed: {0}")]
    Verification(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SignerError>;
