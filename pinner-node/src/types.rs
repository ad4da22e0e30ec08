//! 共享數據類型定義
//!
//! 本模塊定義證明生成與審計驗證共享的數據結構

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 內容標識符
///
/// 不透明的內容尋址字符串。本系統從不生成 CID，
/// 只從存儲層的固定列表中讀取。
pub type Cid = String;

/// 被簽名的證明負載
///
/// 每個證明簽署的內容正是 `{"cid": ...}` 的 JSON 編碼，
/// 將證明綁定到唯一一個內容標識符。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofPayload {
    /// 被固定的內容標識符
    pub cid: Cid,
}

/// 單個固定證明
///
/// 每輪為每個已固定的 CID 生成一條，生成後不可變
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinProof {
    /// 聲稱已固定的內容標識符
    pub cid: Cid,

    /// 簽名者公鑰（hex 編碼的 Dilithium3 公鑰）
    pub signer_public_key: String,

    /// 附加式簽名消息（base64 編碼），簽署 `ProofPayload` 的 JSON 編碼
    pub signature: String,
}

/// 一輪的完整提交
///
/// 每（節點，輪次）一份。`cids` 與 `proofs` 中的 cid 集合
/// 由構造保證一一對應。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// 本輪列出的全部已固定標識符
    pub cids: Vec<Cid>,

    /// 每個標識符一條證明，順序不限
    pub proofs: Vec<PinProof>,
}

/// 外部編排層持有的輪次任務狀態
///
/// 本核心只讀取 `ip_address_list`；其餘字段原樣容忍
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskState {
    /// 參與者身份公鑰 → 網絡地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address_list: Option<HashMap<String, String>>,
}

/// 驗證原語的結果
///
/// `data` 存在時為原始簽名負載的文本形式；驗證失敗時只有 `error`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyOutcome {
    pub fn ok(data: String) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: String) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }
}

/// 計算內容的 SHA-256 摘要（hex 編碼）
///
/// 用於審計日誌中標記交叉驗證雙方的內容
pub fn content_digest(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// 節點運行時配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Kubo HTTP API 端點
    pub ipfs_api_url: String,

    /// Kubo Gateway 端點
    pub ipfs_gateway_url: String,

    /// 路由層監聽地址
    pub listen_addr: String,

    /// Dilithium3 密鑰庫路徑
    pub keystore_path: String,

    /// 輪次狀態存儲路徑
    pub store_path: String,

    /// Kubo 二進制下載目錄
    pub kubo_binary_dir: String,

    /// Kubo 發布資源基礎 URL
    pub kubo_release_base: String,

    /// 是否由本進程託管 Kubo 守護進程
    pub manage_daemon: bool,

    /// Gateway 內容獲取超時（秒）
    pub gateway_timeout_secs: u64,

    /// Kubo API 請求超時（秒）
    pub api_timeout_secs: u64,

    /// 對端節點交叉獲取超時（秒）
    pub peer_timeout_secs: u64,

    /// 守護模式下的輪次間隔（秒）
    pub round_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("pinner-node");

        Self {
            ipfs_api_url: std::env::var("IPFS_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5001".to_string()),
            ipfs_gateway_url: std::env::var("IPFS_GATEWAY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8411".to_string()),
            keystore_path: std::env::var("KEYSTORE_PATH")
                .unwrap_or_else(|_| data_dir.join("keys").to_string_lossy().into_owned()),
            store_path: std::env::var("STORE_PATH")
                .unwrap_or_else(|_| data_dir.join("store").to_string_lossy().into_owned()),
            kubo_binary_dir: std::env::var("KUBO_BINARY_DIR")
                .unwrap_or_else(|_| data_dir.join("kubo").to_string_lossy().into_owned()),
            kubo_release_base: std::env::var("KUBO_RELEASE_BASE").unwrap_or_else(|_| {
                "https://github.com/SyedGhazanferAnwar/kubo-binaries/releases/download/v0.24.0"
                    .to_string()
            }),
            manage_daemon: std::env::var("MANAGE_DAEMON")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(180),
            api_timeout_secs: std::env::var("API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            peer_timeout_secs: std::env::var("PEER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            round_interval_secs: std::env::var("ROUND_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        }
    }
}
