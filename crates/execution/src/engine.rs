//! The time progression engine - moves every active schedule one slot per
//! time unit.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dbr_buffer::BufferZoneManager;
use dbr_core::{
    BoardConfiguration, BoardId, BufferOverflowError, BufferSide, Schedule, ScheduleId,
    ScheduleStatus, TenantId, Time, WorkItem, WorkItemId, WorkItemStatus,
};
use dbr_storage::Storage;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dependency::{DependencyGraph, DependencyResolver, ResolutionSummary};
use crate::error::{EngineError, Result};
use crate::transition::{next_status, ScheduleTransition};

/// Configuration for the time progression engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reject advances that would fill the pre-constraint buffer
    pub enforce_overflow_guard: bool,
    /// Commit storage after each unit
    pub auto_commit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforce_overflow_guard: false,
            auto_commit: true,
        }
    }
}

impl EngineConfig {
    /// Set the overflow guard.
    pub fn with_overflow_guard(mut self, enabled: bool) -> Self {
        self.enforce_overflow_guard = enabled;
        self
    }

    /// Set auto-commit.
    pub fn with_auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }
}

/// Something worth flagging about the board after an unguarded advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverflowWarning {
    /// A schedule sits beyond its buffer
    Penetration {
        /// The schedule
        schedule_id: ScheduleId,
        /// Its offset
        position: i64,
        /// The buffer it ran past
        side: BufferSide,
    },
    /// The pre-constraint buffer is at or over capacity
    PreConstraintFull {
        /// The board
        board: BoardId,
        /// Schedules inside the buffer
        occupancy: usize,
        /// Buffer size
        capacity: u32,
    },
}

/// Result of one unit advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResult {
    /// Tenant the unit ran for
    pub tenant: TenantId,
    /// Schedules moved
    pub advanced: usize,
    /// Schedules that completed in this unit
    pub completed: usize,
    /// Schedules still active afterwards
    pub remaining: usize,
    /// Per-schedule moves
    pub transitions: Vec<ScheduleTransition>,
    /// Overflow warnings
    pub overflow_warnings: Vec<OverflowWarning>,
    /// Dependency resolution performed after the move
    pub resolution: ResolutionSummary,
    /// Logical time before the unit
    pub logical_time_before: u64,
    /// Logical time after the unit
    pub logical_time_after: u64,
}

impl AdvanceResult {
    /// Number of overflow warnings.
    pub fn overflow_warning_count(&self) -> usize {
        self.overflow_warnings.len()
    }
}

/// Result of a multi-unit advance.
///
/// Units run and commit one by one; a failing unit stops the batch and
/// leaves earlier units committed.
#[derive(Debug)]
pub struct BatchAdvance {
    /// Units that completed
    pub units: Vec<AdvanceResult>,
    /// The error that stopped the batch, if any
    pub halted: Option<EngineError>,
}

/// Result of a look-ahead simulation. Nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Tenant simulated
    pub tenant: TenantId,
    /// Simulated units
    pub units: Vec<AdvanceResult>,
    /// Guard trip that ended the simulation early
    pub halted: Option<BufferOverflowError>,
    /// Active schedules as they would stand afterwards
    pub projected_schedules: Vec<Schedule>,
}

/// Everything one unit reads, loaded up front.
#[derive(Debug, Clone)]
struct ScopeSnapshot {
    logical_time: u64,
    boards: HashMap<BoardId, BoardConfiguration>,
    schedules: Vec<Schedule>,
    items: HashMap<WorkItemId, WorkItem>,
    graph: DependencyGraph,
}

impl ScopeSnapshot {
    async fn load(storage: &dyn Storage, tenant: &TenantId) -> Result<Self> {
        let logical_time = storage.load_logical_time(tenant).await?;
        let schedules = storage.list_active_schedules(tenant, None).await?;

        let mut boards = HashMap::new();
        for schedule in &schedules {
            if boards.contains_key(&schedule.board_id) {
                continue;
            }
            let board = storage
                .load_board_configuration(schedule.board_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("board {}", schedule.board_id)))?;
            boards.insert(board.id, board);
        }

        let items = storage
            .list_work_items(tenant)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        let dependencies = storage.list_tenant_dependencies(tenant).await?;

        Ok(Self {
            logical_time,
            boards,
            schedules,
            items,
            graph: DependencyGraph::from_dependencies(tenant.clone(), &dependencies),
        })
    }

    fn board_ids(&self) -> Vec<BoardId> {
        let ids: BTreeSet<BoardId> = self.boards.keys().copied().collect();
        ids.into_iter().collect()
    }
}

/// Changes produced by one step.
struct StepOutcome {
    transitions: Vec<ScheduleTransition>,
    warnings: Vec<OverflowWarning>,
    resolution: ResolutionSummary,
    touched_schedules: Vec<Schedule>,
    touched_items: BTreeSet<WorkItemId>,
    completed: usize,
}

/// Advances DBR boards one time unit at a time.
///
/// Units for the same tenant are serialized through a per-tenant scope lock.
/// The storage mutex is held for a whole unit, so readers sharing the
/// engine's storage handle wait for the unit to finish; monitors that must
/// not wait read through a storage handle of their own.
///
/// Each tenant's logical time lives in storage and is written with the unit
/// that advances it.
pub struct TimeProgressionEngine<S: Storage> {
    storage: Arc<Mutex<S>>,
    resolver: DependencyResolver,
    config: EngineConfig,
    scopes: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl<S: Storage> TimeProgressionEngine<S> {
    /// Create an engine owning its storage.
    pub fn new(storage: S) -> Self {
        Self::with_shared(Arc::new(Mutex::new(storage)))
    }

    /// Create an engine over shared storage.
    pub fn with_shared(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            resolver: DependencyResolver::new(),
            config: EngineConfig::default(),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared handle to the storage.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Logical time reached by a tenant.
    pub async fn logical_time(&self, tenant: &TenantId) -> Result<u64> {
        let storage = self.storage.lock().await;
        Ok(storage.load_logical_time(tenant).await?)
    }

    async fn scope(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        let mut scopes = self.scopes.lock().await;
        Arc::clone(scopes.entry(tenant.clone()).or_default())
    }

    /// Advance every active schedule of a tenant by one slot.
    ///
    /// With the guard set, an advance that would leave any board's
    /// pre-constraint buffer at or over capacity is rejected and nothing is
    /// written. Without it the same condition is reported as a warning.
    ///
    /// When a write fails partway, the schedules, items and clock already
    /// written are put back to their loaded values before the storage is
    /// rolled back, so backends whose rollback restores nothing are left as
    /// they were too.
    pub async fn advance_one_unit(
        &self,
        tenant: &TenantId,
        enforce_overflow_guard: bool,
    ) -> Result<AdvanceResult> {
        let scope = self.scope(tenant).await;
        let _scope = scope.lock().await;
        let mut storage = self.storage.lock().await;

        let mut snapshot = ScopeSnapshot::load(&*storage, tenant).await?;
        let original = snapshot.clone();
        let before = snapshot.logical_time;
        info!(tenant = %tenant, logical_time = before, schedules = snapshot.schedules.len(), "advancing one unit");

        let outcome = match self.step(&mut snapshot, enforce_overflow_guard, chrono::Utc::now()) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(tenant = %tenant, board = %err.board, occupancy = err.projected_occupancy, capacity = err.capacity, "overflow guard rejected advance");
                return Err(err.into());
            }
        };

        if let Err(err) = self.persist(&mut *storage, tenant, &snapshot, &outcome).await {
            warn!(tenant = %tenant, error = %err, "persisting unit failed; restoring loaded state");
            self.restore(&mut *storage, tenant, &original, &outcome).await;
            if let Err(rollback) = storage.rollback().await {
                warn!(tenant = %tenant, error = %rollback, "rollback failed");
            }
            return Err(err);
        }
        if self.config.auto_commit {
            storage
                .commit(&format!("advance {} to logical time {}", tenant, before + 1))
                .await?;
        }

        let result = Self::result(tenant, outcome, snapshot.schedules.len(), before, snapshot.logical_time);

        info!(
            tenant = %tenant,
            advanced = result.advanced,
            completed = result.completed,
            remaining = result.remaining,
            warnings = result.overflow_warning_count(),
            promoted = result.resolution.promoted.len(),
            "unit complete"
        );
        Ok(result)
    }

    /// Advance `units` times, committing each unit on its own.
    ///
    /// Uses the configured overflow guard.
    pub async fn advance_multiple_units(&self, tenant: &TenantId, units: u32) -> BatchAdvance {
        let mut batch = BatchAdvance {
            units: Vec::with_capacity(units as usize),
            halted: None,
        };
        for _ in 0..units {
            match self.advance_one_unit(tenant, self.config.enforce_overflow_guard).await {
                Ok(result) => batch.units.push(result),
                Err(err) => {
                    warn!(tenant = %tenant, completed_units = batch.units.len(), error = %err, "batch halted");
                    batch.halted = Some(err);
                    break;
                }
            }
        }
        batch
    }

    /// Run `units` advances against a private copy of the tenant's state.
    ///
    /// Holds the tenant's scope for the duration, so it never interleaves
    /// with a real advance.
    pub async fn simulate(&self, tenant: &TenantId, units: u32) -> Result<SimulationResult> {
        let scope = self.scope(tenant).await;
        let _scope = scope.lock().await;
        let mut snapshot = {
            let storage = self.storage.lock().await;
            ScopeSnapshot::load(&*storage, tenant).await?
        };

        let mut simulation = SimulationResult {
            tenant: tenant.clone(),
            units: Vec::with_capacity(units as usize),
            halted: None,
            projected_schedules: Vec::new(),
        };
        for _ in 0..units {
            let before = snapshot.logical_time;
            match self.step(&mut snapshot, self.config.enforce_overflow_guard, chrono::Utc::now()) {
                Ok(outcome) => {
                    let result = Self::result(
                        tenant,
                        outcome,
                        snapshot.schedules.len(),
                        before,
                        snapshot.logical_time,
                    );
                    simulation.units.push(result);
                }
                Err(err) => {
                    simulation.halted = Some(err);
                    break;
                }
            }
        }
        simulation.projected_schedules = snapshot.schedules;

        debug!(tenant = %tenant, units = simulation.units.len(), "simulation finished");
        Ok(simulation)
    }

    /// One unit against a snapshot. On a guard trip the snapshot is untouched.
    fn step(
        &self,
        snapshot: &mut ScopeSnapshot,
        enforce_overflow_guard: bool,
        now: Time,
    ) -> std::result::Result<StepOutcome, BufferOverflowError> {
        let mut next = snapshot.schedules.clone();
        let mut transitions = Vec::with_capacity(next.len());

        for schedule in next.iter_mut() {
            let Some(board) = snapshot.boards.get(&schedule.board_id) else {
                continue;
            };
            let old_status = schedule.status;
            let old_position = schedule.position;

            schedule.advance_position();
            let position = schedule.buffer_position(board);
            let new_status = next_status(old_status, &position);

            if position.offset() == 0 {
                schedule.record_ccr_entry(now);
            }
            schedule.apply_status(new_status, now);

            transitions.push(ScheduleTransition {
                schedule_id: schedule.id,
                old_status,
                new_status,
                old_position,
                new_position: schedule.position,
                zone: position.zone(),
            });
        }

        let mut warnings = Vec::new();
        for board_id in snapshot.board_ids() {
            let Some(board) = snapshot.boards.get(&board_id) else {
                continue;
            };
            let manager = BufferZoneManager::new(board, next.iter());
            let occupancy = manager.occupancy(BufferSide::PreConstraint);
            let full = board.pre_constraint_size > 0
                && occupancy >= board.pre_constraint_size as usize;

            if full {
                if enforce_overflow_guard {
                    return Err(BufferOverflowError {
                        board: board.id,
                        projected_occupancy: occupancy,
                        capacity: board.pre_constraint_size,
                    });
                }
                warnings.push(OverflowWarning::PreConstraintFull {
                    board: board.id,
                    occupancy,
                    capacity: board.pre_constraint_size,
                });
            }
            for penetrating in manager.detect_penetration().schedules {
                warnings.push(OverflowWarning::Penetration {
                    schedule_id: penetrating.schedule_id,
                    position: penetrating.position,
                    side: penetrating.zone,
                });
            }
        }

        // Cascade status changes onto member work items.
        let mut touched_items = BTreeSet::new();
        for transition in transitions.iter().filter(|t| t.status_changed()) {
            let Some(schedule) = next.iter().find(|s| s.id == transition.schedule_id) else {
                continue;
            };
            let released = transition.old_status == ScheduleStatus::Planning;
            let completed = transition.new_status == ScheduleStatus::Completed;

            for id in &schedule.work_items {
                let Some(item) = snapshot.items.get_mut(id) else {
                    continue;
                };
                if released && item.status == WorkItemStatus::Ready {
                    item.set_status(WorkItemStatus::InProgress);
                    touched_items.insert(*id);
                }
                if completed && item.status != WorkItemStatus::Done {
                    item.set_status(WorkItemStatus::Done);
                    touched_items.insert(*id);
                }
            }
            debug!(
                schedule = %transition.schedule_id,
                from = transition.old_status.as_str(),
                to = transition.new_status.as_str(),
                position = transition.new_position,
                "schedule transition"
            );
        }

        let resolution = self.resolver.resolve_in_place(&snapshot.graph, &mut snapshot.items);
        touched_items.extend(resolution.promoted.iter().copied());

        let completed = next.iter().filter(|s| !s.is_active()).count();
        snapshot.schedules = next.iter().filter(|s| s.is_active()).cloned().collect();
        snapshot.logical_time += 1;

        Ok(StepOutcome {
            transitions,
            warnings,
            resolution,
            touched_schedules: next,
            touched_items,
            completed,
        })
    }

    async fn persist(
        &self,
        storage: &mut S,
        tenant: &TenantId,
        snapshot: &ScopeSnapshot,
        outcome: &StepOutcome,
    ) -> Result<()> {
        for schedule in &outcome.touched_schedules {
            storage.save_schedule(schedule).await?;
        }
        for id in &outcome.touched_items {
            if let Some(item) = snapshot.items.get(id) {
                storage.save_work_item(item).await?;
            }
        }
        storage.save_logical_time(tenant, snapshot.logical_time).await?;
        Ok(())
    }

    /// Write back the loaded values of everything a failed unit touched.
    async fn restore(&self, storage: &mut S, tenant: &TenantId, original: &ScopeSnapshot, outcome: &StepOutcome) {
        let schedules = outcome
            .touched_schedules
            .iter()
            .filter_map(|touched| original.schedules.iter().find(|s| s.id == touched.id));
        for schedule in schedules {
            if let Err(err) = storage.save_schedule(schedule).await {
                warn!(schedule = %schedule.id, error = %err, "could not restore schedule");
            }
        }
        for item in outcome.touched_items.iter().filter_map(|id| original.items.get(id)) {
            if let Err(err) = storage.save_work_item(item).await {
                warn!(item = %item.id, error = %err, "could not restore work item");
            }
        }
        if let Err(err) = storage.save_logical_time(tenant, original.logical_time).await {
            warn!(tenant = %tenant, error = %err, "could not restore logical time");
        }
    }

    fn result(
        tenant: &TenantId,
        outcome: StepOutcome,
        remaining: usize,
        logical_time_before: u64,
        logical_time_after: u64,
    ) -> AdvanceResult {
        AdvanceResult {
            tenant: tenant.clone(),
            advanced: outcome.transitions.len(),
            completed: outcome.completed,
            remaining,
            transitions: outcome.transitions,
            overflow_warnings: outcome.warnings,
            resolution: outcome.resolution,
            logical_time_before,
            logical_time_after,
        }
    }
}
