//! 身份與簽名網關
//!
//! 外部編排層提供的能力接口：節點公鑰、任意負載的簽名與驗證。
//! 核心流程只依賴 [`IdentityGateway`] trait；生產實現
//! [`KeystoreIdentity`] 由本地密鑰庫支撐。

use crate::error::Result;
use crate::keystore::Keystore;
use crate::types::VerifyOutcome;
use async_trait::async_trait;
use payload_signer::Dilithium3Signer;
use tracing::debug;

/// 身份與簽名網關接口
///
/// 簽名使用附加式簽名消息：`verify_payload` 成功時必然返回
/// 原始簽名負載的文本（`VerifyOutcome::data`），失敗只體現在
/// `VerifyOutcome::error` 中，從不作為 `Err` 傳播。
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// 獲取節點公鑰（hex 編碼）
    async fn public_key(&self) -> Result<String>;

    /// 簽署負載，返回 base64 編碼的簽名消息
    async fn sign_payload(&self, payload: &serde_json::Value) -> Result<String>;

    /// 驗證簽名消息並恢復負載文本
    async fn verify_payload(&self, signature: &str, public_key: &str) -> VerifyOutcome;
}

/// 密鑰庫支撐的網關實現
pub struct KeystoreIdentity {
    signer: Dilithium3Signer,
}

impl KeystoreIdentity {
    pub fn new(keystore: &Keystore) -> Self {
        Self {
            signer: keystore.signer().clone(),
        }
    }

    /// 直接從簽名器構造（測試用）
    pub fn from_signer(signer: Dilithium3Signer) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl IdentityGateway for KeystoreIdentity {
    async fn public_key(&self) -> Result<String> {
        Ok(self.signer.public_key_hex())
    }

    async fn sign_payload(&self, payload: &serde_json::Value) -> Result<String> {
        let bytes = serde_json::to_vec(payload)?;
        let signature = self.signer.sign_base64(&bytes)?;
        debug!(
            payload = %payload,
            signature_len = signature.len(),
            "Signed payload"
        );
        Ok(signature)
    }

    async fn verify_payload(&self, signature: &str, public_key: &str) -> VerifyOutcome {
        // 驗證只依賴提交者聲稱的公鑰，與本節點的密鑰無關
        let verifier = match Dilithium3Signer::from_public_key_hex(public_key) {
            Ok(v) => v,
            Err(e) => return VerifyOutcome::err(format!("Invalid public key: {}", e)),
        };

        let payload = match verifier.open_base64(signature) {
            Ok(p) => p,
            Err(e) => return VerifyOutcome::err(format!("Signature rejected: {}", e)),
        };

        match String::from_utf8(payload) {
            Ok(text) => VerifyOutcome::ok(text),
            Err(e) => VerifyOutcome::err(format!("Signed payload is not valid UTF-8: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProofPayload;
    use payload_signer::Signer;

    fn test_identity() -> KeystoreIdentity {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();
        KeystoreIdentity::from_signer(signer)
    }

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let identity = test_identity();
        let public_key = identity.public_key().await.unwrap();

        let payload = serde_json::json!({ "cid": "QmX" });
        let signature = identity.sign_payload(&payload).await.unwrap();

        let outcome = identity.verify_payload(&signature, &public_key).await;
        assert!(outcome.error.is_none());

        let recovered: ProofPayload = serde_json::from_str(&outcome.data.unwrap()).unwrap();
        assert_eq!(recovered.cid, "QmX");
    }

    #[tokio::test]
    async fn test_verify_with_wrong_key_fails() {
        let identity = test_identity();
        let other = test_identity();

        let payload = serde_json::json!({ "cid": "QmX" });
        let signature = identity.sign_payload(&payload).await.unwrap();

        let outcome = other
            .verify_payload(&signature, &other.public_key().await.unwrap())
            .await;
        assert!(outcome.data.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_verify_garbage_inputs() {
        let identity = test_identity();

        let outcome = identity.verify_payload("c2ln", "not-hex").await;
        assert!(outcome.data.is_none());

        let public_key = identity.public_key().await.unwrap();
        let outcome = identity.verify_payload("!!!", &public_key).await;
        assert!(outcome.data.is_none());
    }
}
