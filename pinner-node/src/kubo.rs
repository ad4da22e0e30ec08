//! Kubo 守護進程託管模塊
//!
//! 將存儲守護進程建模為受監督的外部進程：一個持有子進程句柄的
//! 顯式生命週期對象，啟動與停止都由調用方驅動，停止掛接在
//! 結構化的關停信號路徑上，而非全局退出鉤子。
//!
//! 流程：
//! 1. 按平台解析發布資源名，二進制缺失時下載（Unix 下設可執行位）
//! 2. 以 `daemon --init --migrate=true` 啟動子進程
//! 3. 關停時先執行 `shutdown` 子命令，再回收子進程

use crate::error::{NodeError, Result};
use std::path::{Path, PathBuf};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Kubo 守護進程監督器
pub struct KuboSupervisor {
    binary_path: PathBuf,
    child: Option<Child>,
}

impl KuboSupervisor {
    /// 確保平台對應的 Kubo 二進制就位，返回就緒的監督器
    ///
    /// 二進制已存在時跳過下載
    pub async fn ensure_binary(binary_dir: &Path, release_base: &str) -> Result<Self> {
        let platform = platform_asset()?;
        let binary_path = binary_dir.join(&platform);

        if binary_path.exists() {
            info!("Kubo binary already present at {:?}", binary_path);
            return Ok(Self {
                binary_path,
                child: None,
            });
        }

        tokio::fs::create_dir_all(binary_dir).await?;

        let url = format!("{}/{}", release_base.trim_end_matches('/'), platform);
        info!("Downloading Kubo binary from {}", url);

        let response = reqwest::get(&url).await?;
        if !response.status().is_success() {
            return Err(NodeError::Config(format!(
                "Kubo download returned HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&binary_path, &bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&binary_path).await?.permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&binary_path, perms).await?;
        }

        info!(
            "Kubo binary downloaded to {:?} ({} bytes)",
            binary_path,
            bytes.len()
        );

        Ok(Self {
            binary_path,
            child: None,
        })
    }

    /// 從現有二進制構造（測試/自帶二進制場景）
    pub fn with_binary(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            child: None,
        }
    }

    /// 啟動守護進程
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            warn!("Kubo daemon already running, ignoring start");
            return Ok(());
        }

        info!("Starting Kubo daemon: {:?}", self.binary_path);

        let child = Command::new(&self.binary_path)
            .args(["daemon", "--init", "--migrate=true"])
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NodeError::Config(format!(
                    "Failed to spawn Kubo daemon {:?}: {}",
                    self.binary_path, e
                ))
            })?;

        self.child = Some(child);
        Ok(())
    }

    /// 停止守護進程
    ///
    /// 先通過 Kubo 自己的 `shutdown` 子命令請求退出，再回收子進程
    pub async fn shutdown(&mut self) {
        info!("Stopping Kubo daemon");

        match Command::new(&self.binary_path).arg("shutdown").output().await {
            Ok(output) if output.status.success() => {
                info!("Kubo shutdown command completed");
            }
            Ok(output) => {
                warn!("Kubo shutdown command exited with {}", output.status);
            }
            Err(e) => {
                warn!("Failed to run Kubo shutdown command: {}", e);
            }
        }

        if let Some(mut child) = self.child.take() {
            match child.wait().await {
                Ok(status) => info!("Kubo daemon exited with {}", status),
                Err(e) => warn!("Failed to reap Kubo daemon: {}", e),
            }
        }
    }

    /// 守護進程是否由本監督器持有
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// 二進制路徑
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

/// 按當前平台解析發布資源名
fn platform_asset() -> Result<String> {
    let asset = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "x86_64") => "darwin-amd64_ipfs",
        ("macos", "aarch64") => "darwin-arm64_ipfs",
        ("linux", _) => "linux-amd64_ipfs",
        ("windows", _) => "windows-amd64_ipfs.exe",
        (os, arch) => {
            return Err(NodeError::Config(format!(
                "Unsupported platform: {}/{}",
                os, arch
            )));
        }
    };

    Ok(asset.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_asset_resolves() {
        // 測試機必然是受支持平台之一
        let asset = platform_asset().unwrap();
        assert!(asset.contains("ipfs"));
    }

    #[tokio::test]
    async fn test_ensure_binary_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let asset = platform_asset().unwrap();
        tokio::fs::write(dir.path().join(&asset), b"stub").await.unwrap();

        // 已存在時不觸網
        let supervisor = KuboSupervisor::ensure_binary(dir.path(), "http://127.0.0.1:1")
            .await
            .unwrap();
        assert!(supervisor.binary_path().ends_with(&asset));
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_start_missing_binary_fails() {
        let mut supervisor = KuboSupervisor::with_binary("/nonexistent/kubo-binary");
        assert!(supervisor.start().is_err());
    }
}
