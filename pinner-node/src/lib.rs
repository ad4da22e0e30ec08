//! 去中心化計算網絡的內容固定任務節點
//!
//! 本 crate 實現了一個完整的固定任務節點，負責:
//! 1. 在本地 Kubo 守護進程上固定內容
//! 2. 每輪為已固定的內容標識符生成帶簽名的固定證明
//! 3. 審計其他參與者的提交：獨立重取內容並交叉比對
//! 4. 暴露手動固定/添加/獲取的 HTTP 路由
//!
//! # 架構
//!
//! ```text
//! ┌───────────────┐      ┌───────────────┐
//! │ ProofBuilder  │      │ AuditVerifier │  ← 核心輪次邏輯
//! └──────┬────────┘      └──────┬────────┘
//!        │                      │
//!   ┌────┴───────┬──────────────┼───────────┐
//!   ▼            ▼              ▼           ▼
//! IpfsClient  Identity      RoundStore   Keystore
//!             Gateway
//! ```
//!
//! # 示例用法
//!
//! ```no_run
//! use pinner_node::audit::AuditVerifier;
//! use pinner_node::identity::KeystoreIdentity;
//! use pinner_node::ipfs_client::IpfsClient;
//! use pinner_node::keystore::Keystore;
//! use pinner_node::proof::ProofBuilder;
//! use pinner_node::round_store::FileRoundStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keystore = Keystore::load_or_generate(std::path::Path::new("./keys"))?;
//!     let ipfs = Arc::new(IpfsClient::new(
//!         "http://127.0.0.1:5001".to_string(),
//!         "http://127.0.0.1:8080".to_string(),
//!     ));
//!     let identity = Arc::new(KeystoreIdentity::new(&keystore));
//!     let store = Arc::new(FileRoundStore::new("./store"));
//!
//!     let builder = ProofBuilder::new(ipfs.clone(), identity.clone(), store.clone());
//!     builder.execute(42).await;
//!
//!     let verifier = AuditVerifier::new(ipfs, identity, store, 5);
//!     let verdict = verifier.audit("{...}", 42, "submitter_pk").await;
//!     println!("Audit verdict: {}", verdict);
//!
//!     Ok(())
//! }
//! ```

// 公開模塊
pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod ipfs_client;
pub mod keystore;
pub mod kubo;
pub mod proof;
pub mod round_store;
pub mod routes;
pub mod types;

// Re-export 常用類型
pub use audit::AuditVerifier;
pub use error::{NodeError, Result};
pub use proof::ProofBuilder;
pub use types::{NodeConfig, PinProof, Submission};
