//! JSON file storage implementation.
//!
//! Stores each entity as a JSON file under the storage root and keeps small
//! per-object meta markers (version + updated_at). Writes land immediately;
//! `commit`/`rollback` only track whether anything is pending.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use dbr_core::{
    BoardConfiguration, BoardId, CapacityResource, Dependency, ResourceId, Schedule,
    ScheduleId, TenantId, WorkItem, WorkItemId,
};
use super::{Storage, Result};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

const KINDS: [&str; 6] = [
    "boards",
    "resources",
    "schedules",
    "work_items",
    "dependencies",
    "clocks",
];

/// On-disk record of a tenant's logical time.
#[derive(serde::Serialize, serde::Deserialize)]
struct LogicalClock {
    tenant: TenantId,
    logical_time: u64,
}

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    pending: Arc<Mutex<bool>>,
}

impl JsonStorage {
    /// Create storage, creating the data and meta directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in KINDS {
            fs::create_dir_all(root.join(kind)).await?;
            fs::create_dir_all(root.join("meta").join(kind)).await?;
        }

        Ok(Self {
            root,
            pending: Arc::new(Mutex::new(false)),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entity_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join(kind).join(format!("{}.json", id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    async fn set_pending(&self) {
        *self.pending.lock().await = true;
    }

    /// Whether writes happened since the last commit or rollback.
    pub async fn is_pending(&self) -> bool {
        *self.pending.lock().await
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn write_entity<T: serde::Serialize>(&self, kind: &str, id: String, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.entity_path(kind, &id), json.as_bytes()).await?;
        let version = self.bump_version(kind, &id).await?;
        debug!(kind, %id, version, "saved entity");
        self.set_pending().await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_board_configuration(&mut self, board: &BoardConfiguration) -> Result<()> {
        self.write_entity("boards", board.id.to_string(), board).await
    }

    async fn load_board_configuration(&self, id: BoardId) -> Result<Option<BoardConfiguration>> {
        read_json(&self.entity_path("boards", &id.to_string())).await
    }

    async fn save_capacity_resource(&mut self, resource: &CapacityResource) -> Result<()> {
        self.write_entity("resources", resource.id.to_string(), resource).await
    }

    async fn load_capacity_resource(&self, id: ResourceId) -> Result<Option<CapacityResource>> {
        read_json(&self.entity_path("resources", &id.to_string())).await
    }

    async fn save_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        self.write_entity("schedules", schedule.id.to_string(), schedule).await
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        read_json(&self.entity_path("schedules", &id.to_string())).await
    }

    async fn list_active_schedules(
        &self,
        tenant: &TenantId,
        board: Option<BoardId>,
    ) -> Result<Vec<Schedule>> {
        let all = list_dir(&self.root.join("schedules")).await?;
        let mut schedules: Vec<Schedule> = all
            .into_iter()
            .filter(|s: &Schedule| &s.tenant == tenant && s.is_active())
            .filter(|s| board.map_or(true, |b| s.board_id == b))
            .collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn save_work_item(&mut self, item: &WorkItem) -> Result<()> {
        self.write_entity("work_items", item.id.to_string(), item).await
    }

    async fn load_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = read_json(&self.entity_path("work_items", &id.to_string())).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn list_work_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>> {
        let all = list_dir(&self.root.join("work_items")).await?;
        let mut items: Vec<WorkItem> = all
            .into_iter()
            .filter(|item: &WorkItem| &item.tenant == tenant)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn save_dependency(&mut self, dependency: &Dependency) -> Result<()> {
        self.write_entity("dependencies", dependency.id.to_string(), dependency).await
    }

    async fn list_dependencies(&self, dependent: WorkItemId) -> Result<Vec<Dependency>> {
        let all = list_dir(&self.root.join("dependencies")).await?;
        Ok(all
            .into_iter()
            .filter(|d: &Dependency| d.dependent == dependent)
            .collect())
    }

    async fn list_tenant_dependencies(&self, tenant: &TenantId) -> Result<Vec<Dependency>> {
        let all = list_dir(&self.root.join("dependencies")).await?;
        Ok(all
            .into_iter()
            .filter(|d: &Dependency| &d.tenant == tenant)
            .collect())
    }

    async fn load_logical_time(&self, tenant: &TenantId) -> Result<u64> {
        let clock: Option<LogicalClock> =
            read_json(&self.entity_path("clocks", tenant.as_str())).await?;
        Ok(clock.map_or(0, |c| c.logical_time))
    }

    async fn save_logical_time(&mut self, tenant: &TenantId, logical_time: u64) -> Result<()> {
        let clock = LogicalClock {
            tenant: tenant.clone(),
            logical_time,
        };
        self.write_entity("clocks", tenant.as_str().to_string(), &clock).await
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        debug!(message, "commit");
        *self.pending.lock().await = false;
        Ok(())
    }

    /// Files are written in place, so rollback only clears the pending flag.
    /// Callers that need all-or-nothing writes restore earlier values
    /// themselves.
    async fn rollback(&mut self) -> Result<()> {
        *self.pending.lock().await = false;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}
