//! 輪次狀態存儲
//!
//! 外部編排層的持久化接口：簡單鍵值存儲加上按輪次索引的任務狀態。
//! 生產實現 [`FileRoundStore`] 以每鍵一文件的方式落盤；
//! [`MemoryRoundStore`] 供測試與嵌入場景使用。

use crate::error::{NodeError, Result};
use crate::types::TaskState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// 輪次狀態存儲接口
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// 讀取鍵對應的值
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 寫入鍵值，覆蓋舊值
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 讀取某輪的任務狀態
    async fn task_state(&self, round: u64) -> Result<Option<TaskState>>;
}

/// 文件支撐的存儲實現
///
/// # 文件結構
///
/// ```text
/// {base_path}/
///   ├── value.store             (鍵 "value" 的原始文本)
///   └── task_state_42.json      (第 42 輪的任務狀態)
/// ```
pub struct FileRoundStore {
    base_path: PathBuf,
}

impl FileRoundStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        // 鍵直接成為文件名，拒絕任何路徑穿越成分
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(NodeError::Config(format!("Invalid store key: {:?}", key)));
        }
        Ok(self.base_path.join(format!("{}.store", key)))
    }

    fn task_state_path(&self, round: u64) -> PathBuf {
        self.base_path.join(format!("task_state_{}.json", round))
    }

    /// 寫入某輪的任務狀態（本地測試工具，生產環境由編排層寫入）
    pub async fn put_task_state(&self, round: u64, state: &TaskState) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let text = serde_json::to_string_pretty(state)?;
        tokio::fs::write(self.task_state_path(round), text).await?;
        Ok(())
    }
}

#[async_trait]
impl RoundStore for FileRoundStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        tokio::fs::create_dir_all(&self.base_path).await?;
        tokio::fs::write(&path, value).await?;
        debug!("Stored {} bytes under key {:?}", value.len(), key);
        Ok(())
    }

    async fn task_state(&self, round: u64) -> Result<Option<TaskState>> {
        let path = self.task_state_path(round);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// 內存存儲實現（測試/嵌入用）
#[derive(Default)]
pub struct MemoryRoundStore {
    values: Mutex<HashMap<String, String>>,
    task_states: Mutex<HashMap<u64, TaskState>>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_task_state(&self, round: u64, state: TaskState) {
        self.task_states.lock().unwrap().insert(round, state);
    }
}

#[async_trait]
impl RoundStore for MemoryRoundStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn task_state(&self, round: u64) -> Result<Option<TaskState>> {
        Ok(self.task_states.lock().unwrap().get(&round).cloned())
    }
}
