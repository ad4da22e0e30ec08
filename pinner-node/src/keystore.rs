//! 節點身份密鑰管理與持久化模塊
//!
//! # 密鑰存儲
//!
//! 私鑰以**未加密**形式存儲在文件系統中：
//! - `node_public.key`: 公鑰（1952 bytes，可公開）
//! - `node_secret.key`: 私鑰（4032 bytes，**高度敏感**）
//!
//! ## 文件權限（Unix/Linux）
//!
//! - 私鑰文件自動設置為 `0o600`（僅所有者可讀寫）
//! - 公鑰文件設置為 `0o644`
//!
//! ## 風險警告
//!
//! ⚠️ 私鑰未加密存儲；生產環境應使用硬件 HSM 或加密存儲，
//! 並定期輪換與加密備份。

use crate::error::{NodeError, Result};
use payload_signer::{Dilithium3Signer, Signer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PUBLIC_KEY_FILE: &str = "node_public.key";
const SECRET_KEY_FILE: &str = "node_secret.key";

/// 密鑰庫：管理節點 Dilithium3 密鑰對的持久化存儲
///
/// # 文件結構
///
/// ```text
/// {base_path}/
///   ├── node_public.key  (1952 bytes, Dilithium3 公鑰)
///   └── node_secret.key  (4032 bytes, Dilithium3 私鑰, 僅所有者可讀)
/// ```
pub struct Keystore {
    /// Dilithium3 簽名器（包含公鑰和私鑰）
    signer: Dilithium3Signer,
    /// 密鑰存儲路徑（用於日誌和調試）
    base_path: PathBuf,
}

impl Keystore {
    /// 生成新的 Dilithium3 密鑰對並保存到文件
    pub fn generate_and_save(base_path: &Path) -> Result<Self> {
        info!("Generating new Dilithium3 keypair at {:?}", base_path);

        fs::create_dir_all(base_path).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to create keystore directory {:?}: {}",
                base_path, e
            ))
        })?;

        let mut signer = Dilithium3Signer::new();
        signer
            .generate_keypair()
            .map_err(|e| NodeError::Keystore(format!("Failed to generate keypair: {}", e)))?;

        let public_path = base_path.join(PUBLIC_KEY_FILE);
        fs::write(&public_path, signer.public_key()).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to write public key to {:?}: {}",
                public_path, e
            ))
        })?;

        let secret_path = base_path.join(SECRET_KEY_FILE);
        fs::write(&secret_path, signer.secret_key()).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to write secret key to {:?}: {}",
                secret_path, e
            ))
        })?;

        // 設置文件權限（僅 Unix/Linux）
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut secret_perms = fs::metadata(&secret_path)
                .map_err(|e| {
                    NodeError::Keystore(format!("Failed to read secret key metadata: {}", e))
                })?
                .permissions();
            secret_perms.set_mode(0o600);
            fs::set_permissions(&secret_path, secret_perms).map_err(|e| {
                NodeError::Keystore(format!("Failed to set secret key permissions: {}", e))
            })?;

            let mut public_perms = fs::metadata(&public_path)
                .map_err(|e| {
                    NodeError::Keystore(format!("Failed to read public key metadata: {}", e))
                })?
                .permissions();
            public_perms.set_mode(0o644);
            fs::set_permissions(&public_path, public_perms).map_err(|e| {
                NodeError::Keystore(format!("Failed to set public key permissions: {}", e))
            })?;
        }

        #[cfg(not(unix))]
        {
            warn!("File permissions not set (non-Unix system). Ensure private key security manually!");
        }

        info!("Keypair saved to {:?}", base_path);

        Ok(Self {
            signer,
            base_path: base_path.to_path_buf(),
        })
    }

    /// 從文件加載現有的 Dilithium3 密鑰對
    ///
    /// # 錯誤
    /// - 密鑰文件不存在
    /// - 密鑰格式無效（長度不正確）
    pub fn load(base_path: &Path) -> Result<Self> {
        info!("Loading Dilithium3 keypair from {:?}", base_path);

        let public_path = base_path.join(PUBLIC_KEY_FILE);
        let secret_path = base_path.join(SECRET_KEY_FILE);

        if !public_path.exists() {
            return Err(NodeError::Keystore(format!(
                "Public key file not found: {:?}",
                public_path
            )));
        }

        if !secret_path.exists() {
            return Err(NodeError::Keystore(format!(
                "Secret key file not found: {:?}",
                secret_path
            )));
        }

        let public_key = fs::read(&public_path).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to read public key from {:?}: {}",
                public_path, e
            ))
        })?;

        let secret_key = fs::read(&secret_path).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to read secret key from {:?}: {}",
                secret_path, e
            ))
        })?;

        // 檢查私鑰文件權限（僅 Unix）
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let secret_perms = fs::metadata(&secret_path)
                .map_err(|e| {
                    NodeError::Keystore(format!("Failed to read secret key metadata: {}", e))
                })?
                .permissions();

            let mode = secret_perms.mode() & 0o777;
            if mode != 0o600 {
                warn!(
                    "Secret key file has insecure permissions: {:o} (should be 0o600)",
                    mode
                );
                warn!("Run: chmod 600 {:?}", secret_path);
            }
        }

        let signer = Dilithium3Signer::from_bytes(&public_key, &secret_key).map_err(|e| {
            NodeError::Keystore(format!(
                "Failed to restore keypair from files: {}. Files may be corrupted.",
                e
            ))
        })?;

        info!("Keypair loaded from {:?}", base_path);

        Ok(Self {
            signer,
            base_path: base_path.to_path_buf(),
        })
    }

    /// 加載現有密鑰庫，不存在時生成新的
    pub fn load_or_generate(base_path: &Path) -> Result<Self> {
        if keystore_exists(base_path) {
            Self::load(base_path)
        } else {
            Self::generate_and_save(base_path)
        }
    }

    /// 獲取簽名器的引用
    pub fn signer(&self) -> &Dilithium3Signer {
        &self.signer
    }

    /// 獲取公鑰字節（用於分享給驗證者）
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signer.public_key().to_vec()
    }

    /// 獲取密鑰存儲路徑
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// 檢查密鑰文件是否存在
///
/// 在應用啟動時決定是生成新密鑰還是加載現有密鑰
pub fn keystore_exists(base_path: &Path) -> bool {
    base_path.join(PUBLIC_KEY_FILE).exists() && base_path.join(SECRET_KEY_FILE).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_generate_and_save() {
        let temp_dir = tempfile::tempdir().unwrap();

        let keystore = Keystore::generate_and_save(temp_dir.path()).unwrap();

        assert_eq!(keystore.public_key_bytes().len(), 1952);
        assert!(temp_dir.path().join(PUBLIC_KEY_FILE).exists());
        assert!(temp_dir.path().join(SECRET_KEY_FILE).exists());
    }

    #[test]
    fn test_keystore_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();

        let keystore1 = Keystore::generate_and_save(temp_dir.path()).unwrap();
        let keystore2 = Keystore::load(temp_dir.path()).unwrap();

        assert_eq!(keystore1.public_key_bytes(), keystore2.public_key_bytes());

        // 簽名在重新加載後仍可驗證
        let signed = keystore1.signer().sign(b"persistence test").unwrap();
        assert_eq!(
            keystore2.signer().open(&signed).unwrap(),
            b"persistence test"
        );
    }

    #[test]
    fn test_keystore_load_nonexistent() {
        let temp_dir = tempfile::tempdir().unwrap();

        let result = Keystore::load(temp_dir.path());
        match result {
            Err(NodeError::Keystore(msg)) => assert!(msg.contains("not found")),
            _ => panic!("Expected Keystore error"),
        }
    }

    #[test]
    fn test_load_or_generate() {
        let temp_dir = tempfile::tempdir().unwrap();

        assert!(!keystore_exists(temp_dir.path()));
        let keystore1 = Keystore::load_or_generate(temp_dir.path()).unwrap();
        assert!(keystore_exists(temp_dir.path()));

        let keystore2 = Keystore::load_or_generate(temp_dir.path()).unwrap();
        assert_eq!(keystore1.public_key_bytes(), keystore2.public_key_bytes());
    }

    #[test]
    #[cfg(unix)]
    fn test_secret_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        Keystore::generate_and_save(temp_dir.path()).unwrap();

        let secret_path = temp_dir.path().join(SECRET_KEY_FILE);
        let mode = fs::metadata(&secret_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Secret key should have 0o600 permissions");
    }
}
