use crate::snapshot::ProjectSnapshot;
use async_trait::async_trait;
use gateflow_core::{Event, GateflowError, GateflowResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Persistence seam for the truth store.
///
/// Implementations must persist events atomically and signal optimistic-lock
/// loss as [`GateflowError::Conflict`]; the store surfaces that to callers,
/// who retry.
#[async_trait]
pub trait TruthBackend: Send + Sync {
    /// Durably appends one event to the project's log.
    async fn append_event(&self, event: &Event) -> GateflowResult<()>;

    /// Loads the full ordered event log for a project.
    async fn load_events(&self, project_id: &str) -> GateflowResult<Vec<Event>>;

    /// Persists the derived snapshot.
    async fn write_snapshot(&self, snapshot: &ProjectSnapshot) -> GateflowResult<()>;

    /// Loads the persisted snapshot, if one exists.
    async fn read_snapshot(&self, project_id: &str) -> GateflowResult<Option<ProjectSnapshot>>;

    /// Lists all project ids known to this backend.
    async fn list_projects(&self) -> GateflowResult<Vec<String>>;

    /// Flushes buffered state; called by [`crate::TruthStore::close`].
    async fn flush(&self) -> GateflowResult<()> {
        Ok(())
    }
}

/// File-backed truth persistence using the per-project layout:
///
/// ```text
/// <root>/<project>/.truth/events.jsonl
/// <root>/<project>/.truth/snapshot.json
/// ```
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates the backend, making sure the root directory exists.
    pub async fn new(root: PathBuf) -> GateflowResult<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The `.truth` directory for a project.
    pub fn truth_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id).join(".truth")
    }

    fn events_path(&self, project_id: &str) -> PathBuf {
        self.truth_dir(project_id).join("events.jsonl")
    }

    fn snapshot_path(&self, project_id: &str) -> PathBuf {
        self.truth_dir(project_id).join("snapshot.json")
    }
}

#[async_trait]
impl TruthBackend for FileBackend {
    async fn append_event(&self, event: &Event) -> GateflowResult<()> {
        let dir = self.truth_dir(&event.project_id);
        tokio::fs::create_dir_all(&dir).await?;
        let line = format!("{}\n", serde_json::to_string(event)?);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(&event.project_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn load_events(&self, project_id: &str) -> GateflowResult<Vec<Event>> {
        let path = self.events_path(project_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(path).await?;
        let mut events = Vec::new();
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(line).map_err(|e| {
                GateflowError::Upstream(format!(
                    "corrupt event log for {project_id} at line {}: {e}",
                    idx + 1
                ))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    async fn write_snapshot(&self, snapshot: &ProjectSnapshot) -> GateflowResult<()> {
        let dir = self.truth_dir(&snapshot.project.id);
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_string_pretty(snapshot)?;
        // Write-then-rename so a crash never leaves a torn snapshot.
        let tmp = self.snapshot_path(&snapshot.project.id).with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.snapshot_path(&snapshot.project.id)).await?;
        Ok(())
    }

    async fn read_snapshot(&self, project_id: &str) -> GateflowResult<Option<ProjectSnapshot>> {
        let path = self.snapshot_path(project_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let snapshot = serde_json::from_str(&data)
            .map_err(|e| GateflowError::Upstream(format!("corrupt snapshot for {project_id}: {e}")))?;
        Ok(Some(snapshot))
    }

    async fn list_projects(&self) -> GateflowResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                let has_truth = entry.path().join(".truth").exists();
                if has_truth {
                    if let Some(name) = entry.file_name().to_str() {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory truth persistence, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBackend {
    events: RwLock<BTreeMap<String, Vec<Event>>>,
    snapshots: RwLock<BTreeMap<String, ProjectSnapshot>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TruthBackend for MemoryBackend {
    async fn append_event(&self, event: &Event) -> GateflowResult<()> {
        let mut events = self.events.write().await;
        let log = events.entry(event.project_id.clone()).or_default();
        if let Some(last) = log.last() {
            // Append-only: a stale writer shows up as a non-monotonic seq.
            if event.seq != last.seq + 1 {
                return Err(GateflowError::Conflict(format!(
                    "conflicting write for {}: expected seq {}, got {}",
                    event.project_id,
                    last.seq + 1,
                    event.seq
                )));
            }
        }
        log.push(event.clone());
        Ok(())
    }

    async fn load_events(&self, project_id: &str) -> GateflowResult<Vec<Event>> {
        Ok(self
            .events
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_snapshot(&self, snapshot: &ProjectSnapshot) -> GateflowResult<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.project.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn read_snapshot(&self, project_id: &str) -> GateflowResult<Option<ProjectSnapshot>> {
        Ok(self.snapshots.read().await.get(project_id).cloned())
    }

    async fn list_projects(&self) -> GateflowResult<Vec<String>> {
        Ok(self.events.read().await.keys().cloned().collect())
    }
}
