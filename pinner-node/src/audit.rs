//! 審計驗證模塊
//!
//! 對其他節點的提交獨立重新驗證：簽名真實性、內容可得性、
//! 以及與提交者節點的跨節點內容一致性。整體裁決為所有
//! 單條證明裁決的合取（AND）；系統 fail-closed，
//! 任何歧義或不可達都導致拒絕。

use crate::error::{NodeError, Result};
use crate::identity::IdentityGateway;
use crate::ipfs_client::IpfsClient;
use crate::round_store::RoundStore;
use crate::types::{content_digest, PinProof, ProofPayload, Submission, TaskState};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 單條證明的審計結果
#[derive(Debug, Clone)]
pub struct ProofVerdict {
    /// 被審計的內容標識符
    pub cid: String,

    /// 簽名負載中的 cid 是否與聲稱一致
    pub signature_ok: bool,

    /// 跨節點內容比對是否通過
    pub cross_check_ok: bool,

    /// 失敗原因（如有）
    pub failure_reason: Option<String>,
}

impl ProofVerdict {
    /// 單條證明是否被接受
    pub fn accepted(&self) -> bool {
        self.signature_ok && self.cross_check_ok
    }
}

/// 審計驗證器
pub struct AuditVerifier {
    ipfs: Arc<IpfsClient>,
    identity: Arc<dyn IdentityGateway>,
    store: Arc<dyn RoundStore>,
    peer_client: Client,
    peer_timeout: Duration,
}

impl AuditVerifier {
    pub fn new(
        ipfs: Arc<IpfsClient>,
        identity: Arc<dyn IdentityGateway>,
        store: Arc<dyn RoundStore>,
        peer_timeout_secs: u64,
    ) -> Self {
        let peer_client = Client::builder()
            .timeout(Duration::from_secs(peer_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            ipfs,
            identity,
            store,
            peer_client,
            peer_timeout: Duration::from_secs(peer_timeout_secs),
        }
    }

    /// 審計一份提交，返回單一布爾裁決
    ///
    /// 任何未預期的錯誤都在此邊界被捕獲並記錄，裁決強制為 `false`；
    /// 錯誤從不傳播給調用方。
    pub async fn audit(&self, submission: &str, round: u64, submitter_key: &str) -> bool {
        let start = Instant::now();
        info!(
            "Auditing submission for round {} from {}",
            round, submitter_key
        );

        let verdict = match self.verify_submission(submission, round, submitter_key).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("Audit for round {} failed: {}", round, e);
                false
            }
        };

        info!(
            "Audit for round {} completed in {:.2}s: {}",
            round,
            start.elapsed().as_secs_f64(),
            if verdict { "ACCEPT" } else { "REJECT" }
        );

        verdict
    }

    /// 逐條驗證提交中的證明，合取所有單條裁決
    ///
    /// 結構性失敗（內容不可得、輪次狀態缺失、簽名無法驗證）
    /// 立即終止整個審計；單條比對失敗則記錄並繼續下一條。
    async fn verify_submission(
        &self,
        submission: &str,
        round: u64,
        submitter_key: &str,
    ) -> Result<bool> {
        let submission: Submission = serde_json::from_str(submission)
            .map_err(|e| NodeError::MalformedSubmission(e.to_string()))?;

        if submission.proofs.is_empty() {
            warn!("Submission for round {} carries no proofs, rejecting", round);
            return Ok(false);
        }

        let mut verdicts = Vec::with_capacity(submission.proofs.len());

        for (i, proof) in submission.proofs.iter().enumerate() {
            debug!(
                "Checking proof {}/{}: cid={}",
                i + 1,
                submission.proofs.len(),
                proof.cid
            );

            // 先從共享存儲層取回內容；取不回則整體終止
            let local_bytes = self.ipfs.fetch_content(&proof.cid, None).await?;

            // 輪次狀態缺失時無法核對提交者身份，整體拒絕
            let state = match self.store.task_state(round).await? {
                Some(state) => state,
                None => {
                    warn!("No task state recorded for round {}, rejecting", round);
                    return Ok(false);
                }
            };

            let verdict = self
                .check_proof(proof, &local_bytes, &state, submitter_key)
                .await?;

            if !verdict.accepted() {
                warn!(
                    "Proof for {} rejected: {}",
                    verdict.cid,
                    verdict
                        .failure_reason
                        .as_deref()
                        .unwrap_or("cross-check mismatch")
                );
            }

            verdicts.push(verdict);
        }

        let accepted = verdicts.iter().filter(|v| v.accepted()).count();
        info!(
            "Round {} audit: {}/{} proof(s) accepted",
            round,
            accepted,
            verdicts.len()
        );

        Ok(verdicts.iter().all(|v| v.accepted()))
    }

    /// 驗證單條證明：簽名負載比對 + 跨節點內容比對
    async fn check_proof(
        &self,
        proof: &PinProof,
        local_bytes: &[u8],
        state: &TaskState,
        submitter_key: &str,
    ) -> Result<ProofVerdict> {
        // 驗證必須恢復出負載；否則無從繼續，整體終止
        let outcome = self
            .identity
            .verify_payload(&proof.signature, &proof.signer_public_key)
            .await;

        let data = match outcome.data {
            Some(data) => data,
            None => {
                return Err(NodeError::SignatureInvalid(
                    outcome
                        .error
                        .unwrap_or_else(|| "verification yielded no payload".to_string()),
                ));
            }
        };

        let payload: ProofPayload = serde_json::from_str(&data)
            .map_err(|e| NodeError::SignatureInvalid(format!("undecodable payload: {}", e)))?;

        let signature_ok = payload.cid == proof.cid;
        if !signature_ok {
            warn!(
                "Signed payload cid {} does not match claimed cid {}",
                payload.cid, proof.cid
            );
        }

        // 跨節點一致性：從提交者公佈的地址再取一次同一標識符
        let (cross_check_ok, failure_reason) = self
            .cross_check(&proof.cid, local_bytes, state, submitter_key)
            .await;

        Ok(ProofVerdict {
            cid: proof.cid.clone(),
            signature_ok,
            cross_check_ok,
            failure_reason: if signature_ok {
                failure_reason
            } else {
                Some("signed payload cid mismatch".to_string())
            },
        })
    }

    /// 跨節點比對：拿不到地址、非 200、網絡錯誤或字節不一致都視為失敗
    async fn cross_check(
        &self,
        cid: &str,
        local_bytes: &[u8],
        state: &TaskState,
        submitter_key: &str,
    ) -> (bool, Option<String>) {
        let address = match state
            .ip_address_list
            .as_ref()
            .and_then(|list| list.get(submitter_key))
        {
            Some(address) => address,
            None => {
                warn!("No address advertised for submitter {}", submitter_key);
                return (
                    false,
                    Some(format!("no address for submitter {}", submitter_key)),
                );
            }
        };

        match self.fetch_from_peer(address, cid).await {
            Ok(peer_bytes) => {
                if peer_bytes == local_bytes {
                    debug!("Peer content matches shared storage for {}", cid);
                    (true, None)
                } else {
                    warn!(
                        "Peer content mismatch for {}: local={} peer={}",
                        cid,
                        content_digest(local_bytes),
                        content_digest(&peer_bytes)
                    );
                    (false, Some("peer content mismatch".to_string()))
                }
            }
            Err(e) => {
                warn!("Peer fetch for {} failed: {}", cid, e);
                (false, Some(e.to_string()))
            }
        }
    }

    /// 直接從提交者節點取回內容，時限 5 秒（可配置）
    async fn fetch_from_peer(&self, address: &str, cid: &str) -> Result<Vec<u8>> {
        let url = format!("{}/ipfs/{}", address.trim_end_matches('/'), cid);
        debug!("Fetching {} from peer {}", cid, url);

        let response = self
            .peer_client
            .get(&url)
            .timeout(self.peer_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NodeError::PeerUnreachable(format!(
                        "{}: no response within {}s",
                        url,
                        self.peer_timeout.as_secs()
                    ))
                } else {
                    NodeError::PeerUnreachable(format!("{}: {}", url, e))
                }
            })?;

        // 僅接受 200，重定向或部分響應都不算提供了文件
        if response.status() != StatusCode::OK {
            return Err(NodeError::PeerUnreachable(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NodeError::PeerUnreachable(format!("{}: {}", url, e)))?;

        Ok(bytes.to_vec())
    }
}
