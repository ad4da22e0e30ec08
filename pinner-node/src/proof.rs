//! 每輪證明生成模塊

use crate::error::{NodeError, Result};
use crate::identity::IdentityGateway;
use crate::ipfs_client::IpfsClient;
use crate::round_store::RoundStore;
use crate::types::{Cid, PinProof, Submission};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// 提交在存儲中使用的固定鍵
///
/// 跨輪次只保留最新值；輪次隔離由外部狀態命名空間負責
pub const SUBMISSION_KEY: &str = "value";

/// 證明生成器
///
/// 每輪列出本地已固定的內容標識符，為每個標識符生成一條簽名證明，
/// 並將整體提交持久化，供其他節點審計。
pub struct ProofBuilder {
    ipfs: Arc<IpfsClient>,
    identity: Arc<dyn IdentityGateway>,
    store: Arc<dyn RoundStore>,
}

impl ProofBuilder {
    pub fn new(
        ipfs: Arc<IpfsClient>,
        identity: Arc<dyn IdentityGateway>,
        store: Arc<dyn RoundStore>,
    ) -> Self {
        Self {
            ipfs,
            identity,
            store,
        }
    }

    /// 執行一輪任務
    ///
    /// 盡力而為：任何失敗都被捕獲並記錄，該輪不產生提交，
    /// 既不崩潰進程也不影響後續輪次。
    pub async fn execute(&self, round: u64) {
        let start = Instant::now();
        info!("Executing pinning task for round {}", round);

        match self.run_round(round).await {
            Ok(submission) => {
                info!(
                    "Round {} completed in {:.2}s: {} proof(s) submitted",
                    round,
                    start.elapsed().as_secs_f64(),
                    submission.proofs.len()
                );
            }
            Err(e) => {
                error!("Round {} task failed, no submission stored: {}", round, e);
            }
        }
    }

    /// 一輪的實際流程：列固定 → 簽名 → 組裝 → 持久化
    async fn run_round(&self, round: u64) -> Result<Submission> {
        let cids = self.ipfs.list_pinned().await.map_err(|e| {
            NodeError::ProofGenerationFailed(format!("pin listing failed: {}", e))
        })?;

        let submission = self.build_submission(&cids).await?;

        let text = serde_json::to_string(&submission)?;
        self.store.set(SUBMISSION_KEY, &text).await?;

        info!(
            "Stored submission for round {}: {} cid(s)",
            round,
            submission.cids.len()
        );

        Ok(submission)
    }

    /// 為列出的標識符集合組裝提交
    ///
    /// 各標識符的簽名相互獨立，並發簽發；全部完成後才組裝
    async fn build_submission(&self, cids: &BTreeSet<Cid>) -> Result<Submission> {
        let proofs = try_join_all(cids.iter().map(|cid| self.build_proof(cid))).await?;

        Ok(Submission {
            cids: cids.iter().cloned().collect(),
            proofs,
        })
    }

    async fn build_proof(&self, cid: &Cid) -> Result<PinProof> {
        let signer_public_key = self.identity.public_key().await?;
        let payload = serde_json::json!({ "cid": cid });
        let signature = self.identity.sign_payload(&payload).await?;

        Ok(PinProof {
            cid: cid.clone(),
            signer_public_key,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeystoreIdentity;
    use crate::round_store::MemoryRoundStore;
    use crate::types::ProofPayload;
    use payload_signer::{Dilithium3Signer, Signer};

    fn test_identity() -> Arc<KeystoreIdentity> {
        let mut signer = Dilithium3Signer::new();
        signer.generate_keypair().unwrap();
        Arc::new(KeystoreIdentity::from_signer(signer))
    }

    fn unreachable_client() -> Arc<IpfsClient> {
        // 無監聽者的端口：連接立即失敗
        Arc::new(IpfsClient::with_config(
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:1".to_string(),
            1,
            1,
        ))
    }

    #[tokio::test]
    async fn test_build_submission_one_proof_per_cid() {
        let identity = test_identity();
        let builder = ProofBuilder::new(
            unreachable_client(),
            identity.clone(),
            Arc::new(MemoryRoundStore::new()),
        );

        let cids: BTreeSet<Cid> = ["QmA", "QmB", "QmC"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let submission = builder.build_submission(&cids).await.unwrap();

        assert_eq!(submission.cids.len(), 3);
        assert_eq!(submission.proofs.len(), 3);

        let proof_cids: BTreeSet<Cid> =
            submission.proofs.iter().map(|p| p.cid.clone()).collect();
        assert_eq!(proof_cids, cids);

        // 每條簽名都能恢復出對應的 cid
        let public_key = identity.public_key().await.unwrap();
        for proof in &submission.proofs {
            assert_eq!(proof.signer_public_key, public_key);
            let outcome = identity
                .verify_payload(&proof.signature, &proof.signer_public_key)
                .await;
            let payload: ProofPayload =
                serde_json::from_str(&outcome.data.unwrap()).unwrap();
            assert_eq!(payload.cid, proof.cid);
        }
    }

    #[tokio::test]
    async fn test_failed_pin_listing_stores_nothing() {
        let store = Arc::new(MemoryRoundStore::new());
        let builder =
            ProofBuilder::new(unreachable_client(), test_identity(), store.clone());

        // execute 吞掉錯誤，不 panic
        builder.execute(1).await;

        assert!(store.get(SUBMISSION_KEY).await.unwrap().is_none());
    }
}
