//! JSON file store for the active workflow.
//!
//! The whole [`WorkflowSnapshot`] is one pretty-printed JSON document at
//! `<state_dir>/workflow.json`. Writes go to a temporary sibling first and
//! are renamed into place.

use async_trait::async_trait;
use devgate_application::{RepositoryError, WorkflowRepository, WorkflowSnapshot};
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_FILE: &str = "workflow.json";

pub struct JsonWorkflowStore {
    path: PathBuf,
}

impl JsonWorkflowStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkflowRepository for JsonWorkflowStore {
    async fn load(&self) -> Result<Option<WorkflowSnapshot>, RepositoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| RepositoryError::Corrupt(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved workflow {} to {}", snapshot.instance.id(), self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devgate_domain::{
        CheckpointLabel, CheckpointPlan, ConversationHandle, InstanceId, RoleId, VerdictKind,
        WorkflowInstance,
    };

    fn snapshot() -> WorkflowSnapshot {
        let mut instance = WorkflowInstance::new(
            InstanceId::new("wf-20260101-0a1b2c3d"),
            CheckpointPlan::from_labels(&[CheckpointLabel::Design, CheckpointLabel::Landing]),
            1_000,
        )
        .unwrap();
        instance.record_verdict(
            CheckpointLabel::Design,
            &RoleId::architect(),
            "r1",
            VerdictKind::Approve,
            1_500,
        );
        instance.advance_if_satisfied(0, "r1", 1_600).unwrap();

        let mut handle = ConversationHandle::new(instance.id().clone(), RoleId::architect(), 1_000);
        handle.install_token(devgate_domain::ConversationToken::new("conv_0a"), 1_500);

        WorkflowSnapshot {
            instance,
            handles: vec![handle],
            saved_at: 2_000,
        }
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkflowStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkflowStore::new(dir.path().join("nested"));
        let original = snapshot();
        store.save(&original).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.instance.position(), Some(1));
        assert_eq!(loaded.handles[0].token().unwrap().as_str(), "conv_0a");
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkflowStore::new(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.load().await,
            Err(RepositoryError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_impossible_state_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkflowStore::new(dir.path());
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value["instance"]["state"] = serde_json::json!({"state": "pending", "index": 7});
        std::fs::write(store.path(), value.to_string()).unwrap();

        match store.load().await {
            Err(RepositoryError::Corrupt(message)) => {
                assert!(message.contains("pending at checkpoint #7"), "{message}")
            }
            other => panic!("expected a corrupt state error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkflowStore::new(dir.path());
        store.save(&snapshot()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
