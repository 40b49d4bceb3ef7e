//! 会话持久化：会话列表、消息与滚动摘要

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::types::{Role, TurnMessage};

/// 新建会话时的默认名称
pub const DEFAULT_SESSION_NAME: &str = "New Session";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session id: {0}")]
    InvalidId(String),

    #[error("session store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted session file: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 会话概要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, name: &str) -> Result<String, StoreError>;

    async fn save_message(&self, session_id: &str, role: Role, content: &str)
    -> Result<(), StoreError>;

    async fn get_messages(&self, session_id: &str) -> Result<Vec<TurnMessage>, StoreError>;

    /// 按创建时间倒序
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, StoreError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    async fn rename_session(&self, session_id: &str, name: &str) -> Result<(), StoreError>;

    async fn save_summary(&self, session_id: &str, summary: &str) -> Result<(), StoreError>;

    async fn get_summary(&self, session_id: &str) -> Result<Option<String>, StoreError>;

    /// 最近一个尚无消息的默认会话，用于复用
    async fn last_empty_session(&self) -> Result<Option<String>, StoreError>;
}

/// 单个会话文件的内容
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(flatten)]
    info: SessionInfo,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    messages: Vec<TurnMessage>,
}

/// 每个会话一个JSON文件的存储实现
pub struct FileSessionStore {
    root: PathBuf,
    /// 串行化读-改-写
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// 会话ID必须是UUID，文件路径只由解析后的UUID拼出
    fn session_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        let id = uuid::Uuid::parse_str(session_id)
            .map_err(|_| StoreError::InvalidId(session_id.to_string()))?;
        Ok(self.root.join(format!("{}.json", id.hyphenated())))
    }

    async fn read_record(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_record(&self, record: &SessionRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(record)?;
        let path = self.session_path(&record.info.id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn update<F>(&self, session_id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SessionRecord) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record(session_id).await?;
        apply(&mut record);
        self.write_record(&record).await
    }

    async fn all_records(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut records = Vec::new();
        if !self.root.exists() {
            return Ok(records);
        }

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<SessionRecord>(&content) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("⚠️ 跳过损坏的会话文件 {:?}: {}", path, e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(&self, name: &str) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;
        let record = SessionRecord {
            info: SessionInfo {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                timestamp: Utc::now(),
            },
            summary: None,
            messages: Vec::new(),
        };
        self.write_record(&record).await?;
        Ok(record.info.id)
    }

    async fn save_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError> {
        let message = TurnMessage {
            role,
            content: content.to_string(),
        };
        self.update(session_id, move |record| record.messages.push(message))
            .await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<TurnMessage>, StoreError> {
        Ok(self.read_record(session_id).await?.messages)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, StoreError> {
        let mut sessions: Vec<SessionInfo> = self
            .all_records()
            .await?
            .into_iter()
            .map(|record| record.info)
            .collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }

    async fn rename_session(&self, session_id: &str, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.update(session_id, move |record| record.info.name = name)
            .await
    }

    async fn save_summary(&self, session_id: &str, summary: &str) -> Result<(), StoreError> {
        let summary = summary.to_string();
        self.update(session_id, move |record| record.summary = Some(summary))
            .await
    }

    async fn get_summary(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_record(session_id).await?.summary)
    }

    async fn last_empty_session(&self) -> Result<Option<String>, StoreError> {
        let mut empty: Vec<SessionInfo> = self
            .all_records()
            .await?
            .into_iter()
            .filter(|r| r.info.name == DEFAULT_SESSION_NAME && r.messages.is_empty())
            .map(|r| r.info)
            .collect();
        empty.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(empty.into_iter().next().map(|info| info.id))
    }
}
