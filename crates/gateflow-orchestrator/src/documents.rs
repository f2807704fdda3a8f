use gateflow_agent::{ProjectNotice, SubscriberHub};
use gateflow_core::GateflowResult;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Versioned gate-document storage under `<root>/<project>/docs/`.
///
/// Documents are write-once per version (`<doc_type>-v<N>.md`); revision
/// stores a new version instead of mutating. The change-request log is the
/// one append-only file.
pub struct DocumentStore {
    root: PathBuf,
    hub: Arc<SubscriberHub>,
}

impl DocumentStore {
    /// Creates the store.
    pub fn new(root: PathBuf, hub: Arc<SubscriberHub>) -> Self {
        Self { root, hub }
    }

    fn docs_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id).join("docs")
    }

    fn doc_path(&self, project_id: &str, doc_type: &str, version: u32) -> PathBuf {
        self.docs_dir(project_id)
            .join(format!("{doc_type}-v{version}.md"))
    }

    /// Stores content as the next version of a document type, returning
    /// `(version, path)` and notifying project subscribers.
    pub async fn store(
        &self,
        project_id: &str,
        doc_type: &str,
        content: &str,
    ) -> GateflowResult<(u32, String)> {
        let version = self.latest_version(project_id, doc_type).await? + 1;
        let dir = self.docs_dir(project_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = self.doc_path(project_id, doc_type, version);
        tokio::fs::write(&path, content).await?;

        let path_str = path.to_string_lossy().into_owned();
        self.hub
            .publish_project(
                project_id,
                ProjectNotice::DocumentCreated {
                    doc_type: doc_type.to_string(),
                    path: path_str.clone(),
                    version,
                },
            )
            .await;
        info!(project_id = %project_id, doc_type = %doc_type, version, "document stored");
        Ok((version, path_str))
    }

    /// The latest version and content of a document type, if any exists.
    pub async fn latest(
        &self,
        project_id: &str,
        doc_type: &str,
    ) -> GateflowResult<Option<(u32, String)>> {
        let version = self.latest_version(project_id, doc_type).await?;
        if version == 0 {
            return Ok(None);
        }
        let content =
            tokio::fs::read_to_string(self.doc_path(project_id, doc_type, version)).await?;
        Ok(Some((version, content)))
    }

    /// Appends an entry to the project's append-only change-request log.
    pub async fn append_change_request(
        &self,
        project_id: &str,
        author: &str,
        request: &str,
    ) -> GateflowResult<()> {
        let dir = self.docs_dir(project_id);
        tokio::fs::create_dir_all(&dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("change-requests.md"))
            .await?;
        let entry = format!(
            "- **{}** ({}): {}\n",
            chrono::Utc::now().to_rfc3339(),
            author,
            request.replace('\n', " ")
        );
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn latest_version(&self, project_id: &str, doc_type: &str) -> GateflowResult<u32> {
        let dir = self.docs_dir(project_id);
        if !dir.exists() {
            return Ok(0);
        }
        let prefix = format!("{doc_type}-v");
        let mut latest = 0;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(version) = rest
                .strip_suffix(".md")
                .and_then(|v| v.parse::<u32>().ok())
            {
                latest = latest.max(version);
            }
        }
        Ok(latest)
    }
}
