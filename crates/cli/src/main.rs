//! DBR CLI - Drum-Buffer-Rope board scheduling.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbr_buffer::BoardMonitor;
use dbr_core::{
    BoardConfiguration, BoardId, CapacityResource, Dependency, ScheduleId, TenantId, TimeUnit,
    WorkItem, WorkItemStatus,
};
use dbr_execution::{
    AdvanceResult, DependencyResolver, EngineConfig, OverflowWarning, ScheduleManager,
    TimeProgressionEngine,
};
use dbr_storage::{JsonStorage, Storage};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbr")]
#[command(about = "Drum-Buffer-Rope scheduling around a capacity constrained resource", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = ".dbr")]
    storage: PathBuf,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a sample board with schedules and dependencies
    Demo {
        /// Tenant
        #[arg(long)]
        tenant: String,
    },
    /// Show zone status, penetration and health of a board
    Status {
        /// Tenant
        #[arg(long)]
        tenant: String,
        /// Board ID
        #[arg(long)]
        board: String,
    },
    /// Show buffer alerts of a board
    Alerts {
        /// Tenant
        #[arg(long)]
        tenant: String,
        /// Board ID
        #[arg(long)]
        board: String,
    },
    /// Advance all boards of a tenant
    Advance {
        /// Tenant
        #[arg(long)]
        tenant: String,
        /// Number of time units
        #[arg(long, default_value = "1")]
        units: u32,
        /// Reject advances that would fill a pre-constraint buffer
        #[arg(long)]
        guard: bool,
    },
    /// Look ahead without saving anything
    Simulate {
        /// Tenant
        #[arg(long)]
        tenant: String,
        /// Number of time units
        #[arg(long)]
        units: u32,
        /// Stop at the first full pre-constraint buffer
        #[arg(long)]
        guard: bool,
    },
    /// Validate a schedule against its CCR
    Validate {
        /// Schedule ID
        #[arg(long)]
        schedule: String,
    },
    /// Promote work items whose prerequisites are done
    Resolve {
        /// Tenant
        #[arg(long)]
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut storage = JsonStorage::new(&cli.storage)
        .await
        .with_context(|| format!("opening storage at {}", cli.storage.display()))?;

    match cli.command {
        Commands::Demo { tenant } => {
            let board = seed_demo(&mut storage, &TenantId::new(tenant)).await?;
            println!("Seeded board {} ({})", board.id, board.name);
            println!("  pre-constraint: {} units", board.pre_constraint_size);
            println!("  post-constraint: {} units", board.post_constraint_size);
        }
        Commands::Status { tenant, board } => {
            let report = BoardMonitor::new()
                .report(&storage, &TenantId::new(tenant), parse_board(&board)?)
                .await?;
            if cli.json {
                return print_json(&report);
            }

            let zones = &report.zone_status;
            println!("Board {}", board);
            for zone in [&zones.pre_constraint, &zones.post_constraint] {
                println!(
                    "  {:<16} {}/{} ({:.1}%) {}",
                    zone.side.as_str(),
                    zone.occupancy_count,
                    zone.capacity,
                    zone.occupancy_percentage,
                    zone.health,
                );
            }
            println!("  Overall: {}", report.health.overall_status);
            println!("  Active schedules: {}", report.health.total_active_schedules);
            println!("  CCR occupied: {}", report.health.ccr_occupied);
            println!("  Can release: {}", report.can_release);
            println!(
                "  Flow: throughput {:.2}, bottleneck risk {}, penetration risk {}, balance {:.1}",
                report.health.flow.throughput_rate,
                report.health.flow.bottleneck_risk,
                report.health.flow.penetration_risk,
                report.health.flow.flow_balance,
            );
            if report.penetration.penetrated {
                println!("  Penetration at {:?}", report.penetration.overflow_positions);
            }
        }
        Commands::Alerts { tenant, board } => {
            let report = BoardMonitor::new()
                .report(&storage, &TenantId::new(tenant), parse_board(&board)?)
                .await?;
            if cli.json {
                return print_json(&report.alerts);
            }

            println!("Alerts ({})", report.alerts.len());
            for alert in &report.alerts {
                println!("  [{}] {}", alert.level, alert.message);
            }
        }
        Commands::Advance { tenant, units, guard } => {
            let tenant = TenantId::new(tenant);
            let engine = TimeProgressionEngine::new(storage)
                .with_config(EngineConfig::default().with_overflow_guard(guard));
            let batch = engine.advance_multiple_units(&tenant, units).await;

            if cli.json {
                print_json(&batch.units)?;
            } else {
                for unit in &batch.units {
                    print_unit(unit);
                }
            }
            if let Some(err) = batch.halted {
                return Err(err).context(format!(
                    "advance halted after {} of {} units",
                    batch.units.len(),
                    units
                ));
            }
        }
        Commands::Simulate { tenant, units, guard } => {
            let tenant = TenantId::new(tenant);
            let engine = TimeProgressionEngine::new(storage)
                .with_config(EngineConfig::default().with_overflow_guard(guard));
            let simulation = engine.simulate(&tenant, units).await?;
            if cli.json {
                return print_json(&simulation);
            }

            println!("Simulation of {} units (nothing saved)", units);
            for unit in &simulation.units {
                print_unit(unit);
            }
            if let Some(overflow) = &simulation.halted {
                println!("  Stopped: {}", overflow);
            }
            println!("Projected schedules ({})", simulation.projected_schedules.len());
            for schedule in &simulation.projected_schedules {
                println!(
                    "  {} | {:>3} | {} - {}",
                    schedule.id, schedule.position, schedule.status, schedule.name
                );
            }
        }
        Commands::Validate { schedule } => {
            let schedule_id: ScheduleId = schedule
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid schedule ID: {}", schedule))?;
            let manager = ScheduleManager::new();
            let load = manager.resource_load(&storage, schedule_id).await?;
            manager.validate(&storage, schedule_id).await?;

            println!("Schedule {} is valid", schedule_id);
            println!("  Demand: {:.1}h", load.demand);
            println!("  Utilization: {:.0}%", load.utilization * 100.0);
            println!("  Available: {:.1}h", load.available);
        }
        Commands::Resolve { tenant } => {
            let tenant = TenantId::new(tenant);
            let summary = DependencyResolver::new()
                .resolve_newly_ready(&mut storage, &tenant)
                .await?;
            storage.commit(&format!("resolve {}", tenant)).await?;
            if cli.json {
                return print_json(&summary);
            }

            println!("Promoted {} work items", summary.promoted.len());
            for id in &summary.promoted {
                println!("  {}", id);
            }
            println!("Still blocked: {}", summary.still_blocked);
        }
    }

    Ok(())
}

/// Seed a CCR, a 5/3 board, a dependency chain and three schedules.
async fn seed_demo(storage: &mut JsonStorage, tenant: &TenantId) -> Result<BoardConfiguration> {
    let ccr = CapacityResource::new(tenant.clone(), "assembly", 40.0, TimeUnit::Week);
    let board = BoardConfiguration::new(tenant.clone(), "assembly line", ccr.id, 5, 3);
    storage.save_capacity_resource(&ccr).await?;
    storage.save_board_configuration(&board).await?;

    let mut items = Vec::new();
    for (title, hours) in [("frame", 12.0), ("wiring", 8.0), ("panels", 16.0), ("casing", 10.0)] {
        let item = WorkItem::new(tenant.clone(), title)
            .with_hours(ccr.name.clone(), hours)
            .with_status(WorkItemStatus::Ready);
        storage.save_work_item(&item).await?;
        items.push(item);
    }
    let testing = WorkItem::new(tenant.clone(), "testing").with_hours(ccr.name.clone(), 6.0);
    let shipping = WorkItem::new(tenant.clone(), "shipping").with_hours(ccr.name.clone(), 2.0);
    storage.save_work_item(&testing).await?;
    storage.save_work_item(&shipping).await?;

    let resolver = DependencyResolver::new();
    resolver
        .add_dependency(storage, Dependency::finish_to_start(tenant.clone(), testing.id, items[0].id))
        .await?;
    resolver
        .add_dependency(storage, Dependency::finish_to_start(tenant.clone(), shipping.id, testing.id))
        .await?;

    let manager = ScheduleManager::new();
    let first = manager.create_schedule(storage, board.id, "batch-1").await?;
    manager.add_work_item(storage, first.id, items[0].id).await?;
    manager.add_work_item(storage, first.id, items[1].id).await?;
    let second = manager.create_schedule(storage, board.id, "batch-2").await?;
    manager.add_work_item(storage, second.id, items[2].id).await?;
    let third = manager.create_schedule(storage, board.id, "batch-3").await?;
    manager.add_work_item(storage, third.id, items[3].id).await?;

    storage.commit(&format!("seed demo board for {}", tenant)).await?;
    info!(tenant = %tenant, board = %board.id, "demo seeded");
    Ok(board)
}

fn parse_board(s: &str) -> Result<BoardId> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid board ID: {}", s))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_unit(unit: &AdvanceResult) {
    println!(
        "t={} -> t={}: advanced {}, completed {}, remaining {}",
        unit.logical_time_before, unit.logical_time_after, unit.advanced, unit.completed, unit.remaining
    );
    for transition in unit.transitions.iter().filter(|t| t.status_changed()) {
        println!(
            "  {} {} -> {} at {}",
            transition.schedule_id, transition.old_status, transition.new_status, transition.new_position
        );
    }
    for warning in &unit.overflow_warnings {
        match warning {
            OverflowWarning::Penetration { schedule_id, position, side } => {
                println!("  warning: {} beyond {} buffer at {}", schedule_id, side, position);
            }
            OverflowWarning::PreConstraintFull { occupancy, capacity, .. } => {
                println!("  warning: pre-constraint buffer at {}/{}", occupancy, capacity);
            }
        }
    }
    if !unit.resolution.promoted.is_empty() {
        println!("  promoted {} work items to ready", unit.resolution.promoted.len());
    }
}
