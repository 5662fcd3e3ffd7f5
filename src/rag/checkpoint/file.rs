// SPDX-License-Identifier: MIT

//! One JSON file per conversation, replaced atomically on save

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::ConversationStore;
use crate::adk::error::RagError;
use crate::rag::state::WorkflowState;

pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ids become file names, so anything outside `[A-Za-z0-9_-]` is escaped
    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let mut name = String::with_capacity(conversation_id.len());
        for c in conversation_id.chars() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                name.push(c);
            } else {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    name.push_str(&format!("%{:02X}", byte));
                }
            }
        }
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<WorkflowState>, RagError> {
        let path = self.path_for(conversation_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RagError::store(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::store(format!("decoding {}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    async fn save(&self, conversation_id: &str, state: &WorkflowState) -> Result<(), RagError> {
        let path = self.path_for(conversation_id);
        let body = serde_json::to_vec_pretty(state).map_err(|e| RagError::store(e.to_string()))?;
        write_atomic(&self.dir, &path, &body)
            .await
            .map_err(|e| RagError::store(format!("writing {}: {}", path.display(), e)))?;
        log::debug!("Checkpoint written to {}", path.display());
        Ok(())
    }
}

async fn write_atomic(dir: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        uuid::Uuid::new_v4()
    ));

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}
