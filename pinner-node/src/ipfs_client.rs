//! 存儲服務客戶端模塊
//!
//! 負責與本地 Kubo 守護進程通信:
//! - 列出當前已固定的內容標識符
//! - 通過 Gateway 獲取內容字節
//! - 以目錄包裹方式添加文件
//! - 對讀取過的內容補固定（fire-and-forget）
//!
//! # API 端點
//!
//! 基於 Kubo 的 HTTP API 與 Gateway:
//! - `POST /api/v0/pin/ls` - 固定列表
//! - `POST /api/v0/add?wrap-with-directory=true&cid-version=1` - 添加文件
//! - `POST /api/v0/pin/add?arg={cid}` - 添加固定
//! - `GET /ipfs/{cid}[/{filename}]` - Gateway 內容獲取
//!
//! # 超時
//!
//! - Gateway 獲取: 180 秒（可配置）
//! - API 操作: 30 秒（可配置）
//!
//! 本層不做重試，單次失敗即終止該輪/該次審計，
//! 是否重新發起由外部調度器決定。

use crate::error::{NodeError, Result};
use crate::types::Cid;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默認 API 超時（秒）
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// 默認 Gateway 獲取超時（秒）
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 180;

/// `pin/ls` 響應
///
/// `Keys` 將每個已固定的 CID 映射到其固定元數據
#[derive(Deserialize, Debug)]
pub struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    pub keys: std::collections::HashMap<String, PinMeta>,
}

/// 單條固定的元數據
#[derive(Deserialize, Debug)]
pub struct PinMeta {
    #[serde(rename = "Type", default)]
    pub pin_type: String,
}

/// `add` 響應中的一行（newline-delimited JSON）
#[derive(Deserialize, Debug)]
struct AddEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

/// 存儲服務客戶端
///
/// 封裝與單個 Kubo 守護進程的所有 HTTP 交互
pub struct IpfsClient {
    /// HTTP 客戶端
    http_client: Client,

    /// Kubo API 基礎 URL，例如 "http://127.0.0.1:5001"
    api_url: String,

    /// Kubo Gateway 基礎 URL，例如 "http://127.0.0.1:8080"
    gateway_url: String,

    /// Gateway 內容獲取超時
    gateway_timeout: Duration,
}

impl IpfsClient {
    /// 創建新的存儲服務客戶端
    ///
    /// # 示例
    /// ```no_run
    /// use pinner_node::ipfs_client::IpfsClient;
    ///
    /// let client = IpfsClient::new(
    ///     "http://127.0.0.1:5001".to_string(),
    ///     "http://127.0.0.1:8080".to_string(),
    /// );
    /// ```
    pub fn new(api_url: String, gateway_url: String) -> Self {
        Self::with_config(
            api_url,
            gateway_url,
            DEFAULT_API_TIMEOUT_SECS,
            DEFAULT_GATEWAY_TIMEOUT_SECS,
        )
    }

    /// 創建帶自定義超時的客戶端
    pub fn with_config(
        api_url: String,
        gateway_url: String,
        api_timeout_secs: u64,
        gateway_timeout_secs: u64,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(api_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        info!(
            "Created IpfsClient for api={} gateway={} (api_timeout: {}s, gateway_timeout: {}s)",
            api_url, gateway_url, api_timeout_secs, gateway_timeout_secs
        );

        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
        }
    }

    /// 列出當前已固定的內容標識符
    ///
    /// # 返回
    /// - `Ok(BTreeSet<Cid>)`: 已固定的 CID 集合
    /// - `Err(StorageUnavailable | StorageTimeout)`: 守護進程不可達
    pub async fn list_pinned(&self) -> Result<BTreeSet<Cid>> {
        let url = format!("{}/api/v0/pin/ls", self.api_url);
        debug!("Listing pinned CIDs via {}", url);

        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error("pin/ls", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(NodeError::StorageUnavailable(format!(
                "pin/ls returned HTTP {}: {}",
                status, body
            )));
        }

        let parsed = response
            .json::<PinLsResponse>()
            .await
            .map_err(|e| NodeError::Serialization(format!("Failed to parse pin/ls: {}", e)))?;

        let cids: BTreeSet<Cid> = parsed.keys.into_keys().collect();
        info!("Storage daemon reports {} pinned CID(s)", cids.len());

        Ok(cids)
    }

    /// 通過 Gateway 獲取內容字節
    ///
    /// # 參數
    /// - `cid`: 內容標識符
    /// - `filename`: 目錄包裹內容的可選文件名
    ///
    /// # 返回
    /// - `Err(NotFound)`: Gateway 返回 HTTP 404
    /// - `Err(StorageTimeout)`: 超出 Gateway 時限
    /// - `Err(StorageUnavailable)`: 連接失敗或其他非 2xx 狀態
    pub async fn fetch_content(&self, cid: &str, filename: Option<&str>) -> Result<Vec<u8>> {
        let url = match filename {
            Some(name) => format!("{}/ipfs/{}/{}", self.gateway_url, cid, name),
            None => format!("{}/ipfs/{}", self.gateway_url, cid),
        };

        debug!("Fetching content from {}", url);

        let response = self
            .http_client
            .get(&url)
            .timeout(self.gateway_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(cid, e))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(NodeError::NotFound(cid.to_string()));
        }

        if !status.is_success() {
            return Err(NodeError::StorageUnavailable(format!(
                "Gateway returned HTTP {} for {}",
                status, cid
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(cid, e))?;

        debug!("Fetched {} bytes for {}", bytes.len(), cid);
        Ok(bytes.to_vec())
    }

    /// 以目錄包裹方式添加一個或多個文件
    ///
    /// 返回包裹目錄的 CID（`add` 響應中 `Name` 為空的那一行）
    pub async fn add_content(&self, files: Vec<(String, Vec<u8>)>) -> Result<Cid> {
        if files.is_empty() {
            return Err(NodeError::StorageUnavailable(
                "No files supplied for add".to_string(),
            ));
        }

        let url = format!(
            "{}/api/v0/add?wrap-with-directory=true&cid-version=1",
            self.api_url
        );

        let mut form = Form::new();
        for (index, (name, bytes)) in files.into_iter().enumerate() {
            let part = Part::bytes(bytes).file_name(name.clone());
            form = form.part(format!("{}-{}", name, index), part);
        }

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport_error("add", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(NodeError::StorageUnavailable(format!(
                "add returned HTTP {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error("add", e))?;

        let cid = parse_add_response(&text)?;
        info!("Added directory-wrapped content: {}", cid);
        Ok(cid)
    }

    /// 對內容補固定，fire-and-forget
    ///
    /// 作為分離的後台任務執行：失敗只記入日誌，
    /// 絕不阻塞或影響觸發它的讀取路徑。
    pub fn spawn_pin(&self, cid: &str) {
        let client = self.http_client.clone();
        let url = format!("{}/api/v0/pin/add?arg={}", self.api_url, cid);
        let cid = cid.to_string();

        tokio::spawn(async move {
            match client.post(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Pin added for {}", cid);
                }
                Ok(response) => {
                    warn!("Pin add for {} returned HTTP {}", cid, response.status());
                }
                Err(e) => {
                    warn!("Pin add for {} failed: {}", cid, e);
                }
            }
        });
    }

    /// 將 reqwest 傳輸錯誤映射到錯誤分類
    fn map_transport_error(&self, context: &str, e: reqwest::Error) -> NodeError {
        if e.is_timeout() {
            NodeError::StorageTimeout(format!("{}: {}", context, e))
        } else if e.is_connect() {
            NodeError::StorageUnavailable(format!("{}: connection failed - {}", context, e))
        } else {
            NodeError::StorageUnavailable(format!("{}: {}", context, e))
        }
    }

    /// 獲取 API 基礎 URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// 獲取 Gateway 基礎 URL
    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }
}

/// 從 `add` 的 NDJSON 響應中提取包裹目錄的 CID
fn parse_add_response(text: &str) -> Result<Cid> {
    let entries: Vec<AddEntry> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| NodeError::Serialization(format!("Failed to parse add response: {}", e)))?;

    entries
        .iter()
        .find(|entry| entry.name.is_empty())
        .map(|entry| entry.hash.clone())
        .ok_or_else(|| {
            NodeError::StorageUnavailable("add response missing wrapping directory entry".to_string())
        })
}
