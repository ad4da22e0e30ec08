//! 節點統一錯誤類型定義
//!
//! 本模塊定義了固定任務與審計流程中可能遇到的所有錯誤類型，
//! 使用 thiserror crate 提供良好的錯誤鏈和上下文信息。

use thiserror::Error;

/// 節點錯誤類型
///
/// 涵蓋所有子系統的錯誤情況：
/// - 存儲服務（Kubo API / Gateway）交互
/// - 證明生成與簽名
/// - 審計驗證
/// - 配置與密鑰管理
#[derive(Error, Debug)]
pub enum NodeError {
    /// 存儲服務不可達
    ///
    /// 當本地存儲守護進程無法連接或返回非預期狀態時返回此錯誤
    #[error("Storage service unavailable: {0}")]
    StorageUnavailable(String),

    /// 存儲服務請求超時
    ///
    /// Gateway 內容獲取的時限為 180 秒
    #[error("Storage request timed out: {0}")]
    StorageTimeout(String),

    /// 內容不存在
    ///
    /// Gateway 對請求的內容標識符返回 HTTP 404
    #[error("Content not found: {0}")]
    NotFound(String),

    /// 簽名無效
    ///
    /// 當證明的簽名無法通過驗證（無法恢復負載）時返回此錯誤
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// 對端節點不可達
    ///
    /// 交叉驗證時，提交者公佈的地址無法在時限內返回內容
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    /// 提交格式錯誤
    ///
    /// 審計輸入無法反序列化為合法的 Submission
    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),

    /// 證明生成失敗
    ///
    /// 當一輪的固定列表無法獲取、簽名或持久化時返回此錯誤；
    /// 該輪不產生提交
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// 配置錯誤
    #[error("Configuration error: {0}")]
    Config(String),

    /// 密鑰庫錯誤
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// 序列化/反序列化錯誤
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 簽名庫錯誤
    #[error("Signer error: {0}")]
    Signer(#[from] payload_signer::SignerError),

    /// HTTP 請求錯誤
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O 錯誤
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 通用錯誤
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 類型別名
pub type Result<T> = std::result::Result<T, NodeError>;

/// 從 JSON 錯誤轉換
impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Serialization(err.to_string())
    }
}
