//! 配置管理模塊
//!
//! 負責加載和驗證節點配置

use crate::error::{NodeError, Result};
use crate::types::NodeConfig;
use config::{Config, File};
use std::path::Path;

/// 從配置文件加載節點配置
///
/// # 參數
/// - `config_path`: 配置文件路徑（支持 TOML、JSON、YAML）
///
/// # 返回
/// - `Ok(NodeConfig)`: 成功加載的配置
/// - `Err(NodeError)`: 配置文件格式錯誤或缺少必要字段
///
/// # 示例
/// ```no_run
/// use pinner_node::config::load_config;
///
/// let config = load_config("config.toml").expect("Failed to load config");
/// println!("IPFS API: {}", config.ipfs_api_url);
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<NodeConfig> {
    let config = Config::builder()
        .add_source(File::from(config_path.as_ref()))
        .build()
        .map_err(|e| NodeError::Config(format!("Failed to load config file: {}", e)))?;

    let node_config: NodeConfig = config
        .try_deserialize()
        .map_err(|e| NodeError::Config(format!("Failed to parse config: {}", e)))?;

    validate_config(&node_config)?;

    Ok(node_config)
}

/// 從環境變量加載配置（用於容器化部署）
///
/// 環境變量前綴: `PINNER_`
/// 示例: `PINNER_IPFS_API_URL`, `PINNER_ROUND_INTERVAL_SECS`
pub fn load_config_from_env() -> Result<NodeConfig> {
    let config = Config::builder()
        .add_source(config::Environment::with_prefix("PINNER"))
        .build()
        .map_err(|e| NodeError::Config(format!("Failed to load env vars: {}", e)))?;

    let node_config: NodeConfig = config
        .try_deserialize()
        .map_err(|e| NodeError::Config(format!("Failed to parse env config: {}", e)))?;

    validate_config(&node_config)?;

    Ok(node_config)
}

/// 驗證配置的有效性
///
/// 檢查:
/// - 端點 URL 格式
/// - 各超時是否非零
pub fn validate_config(config: &NodeConfig) -> Result<()> {
    for (name, url) in [
        ("ipfs_api_url", &config.ipfs_api_url),
        ("ipfs_gateway_url", &config.ipfs_gateway_url),
        ("kubo_release_base", &config.kubo_release_base),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(NodeError::Config(format!("Invalid {}: {}", name, url)));
        }
    }

    if config.gateway_timeout_secs == 0 {
        return Err(NodeError::Config(
            "gateway_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.peer_timeout_secs == 0 {
        return Err(NodeError::Config(
            "peer_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.api_timeout_secs == 0 {
        return Err(NodeError::Config(
            "api_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.round_interval_secs == 0 {
        return Err(NodeError::Config(
            "round_interval_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_api_url() {
        let mut config = NodeConfig::default();
        config.ipfs_api_url = "127.0.0.1:5001".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_peer_timeout_rejected() {
        let mut config = NodeConfig::default();
        config.peer_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_round_interval_rejected() {
        let mut config = NodeConfig::default();
        config.round_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
ipfs_api_url = "http://127.0.0.1:5001"
ipfs_gateway_url = "http://127.0.0.1:8080"
listen_addr = "127.0.0.1:9000"
keystore_path = "./keys"
store_path = "./store"
kubo_binary_dir = "./kubo"
kubo_release_base = "https://example.com/kubo"
manage_daemon = false
gateway_timeout_secs = 180
api_timeout_secs = 30
peer_timeout_secs = 5
round_interval_secs = 600
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.peer_timeout_secs, 5);
    }
}
