use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use scavenger_core::app::{CandidateState, PassReport, Scavenger, ScavengerConfig};
use scavenger_core::domain::{TaskListInfo, TaskListKey, TaskListType};
use scavenger_core::impls::{InMemoryTaskListStore, StaticDomainCache};
use scavenger_core::observability::init_tracing;

/// Runs reclamation passes against an in-memory task list store.
#[derive(Debug, Parser)]
#[command(name = "scavenger", version)]
struct Args {
    /// JSON config file. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON fixture describing domains, task lists and tasks.
    /// A small built-in data set is used when omitted.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Number of passes to run.
    #[arg(long, default_value_t = 1)]
    passes: u32,

    /// Print each pass report as JSON.
    #[arg(long)]
    json: bool,

    /// Default log filter (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixture {
    domains: Vec<FixtureDomain>,
    task_lists: Vec<FixtureTaskList>,
    stray_tasks: Vec<FixtureStrayTasks>,
}

#[derive(Debug, Deserialize)]
struct FixtureDomain {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FixtureTaskList {
    #[serde(flatten)]
    info: TaskListInfo,
    #[serde(default)]
    tasks: Vec<i64>,
    #[serde(default)]
    orphaned: bool,
}

/// Tasks whose task list record no longer exists.
#[derive(Debug, Deserialize)]
struct FixtureStrayTasks {
    domain_id: String,
    name: String,
    task_type: TaskListType,
    tasks: Vec<i64>,
}

impl Fixture {
    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
    }

    fn demo() -> Self {
        let list = |name: &str, task_type, range_id, tasks: Vec<i64>, orphaned| FixtureTaskList {
            info: TaskListInfo::new("d-orders", name, task_type, range_id),
            tasks,
            orphaned,
        };
        Self {
            domains: vec![FixtureDomain {
                id: "d-orders".into(),
                name: "orders".into(),
            }],
            task_lists: vec![
                list("checkout", TaskListType::Activity, 3, vec![11, 12, 13], true),
                list("checkout", TaskListType::Decision, 5, vec![], true),
                list("shipping", TaskListType::Activity, 1, vec![40], false),
            ],
            stray_tasks: vec![FixtureStrayTasks {
                domain_id: "d-orders".into(),
                name: "refunds".into(),
                task_type: TaskListType::Activity,
                tasks: vec![7],
            }],
        }
    }

    async fn seed(self, store: &InMemoryTaskListStore, domains: &StaticDomainCache) {
        for domain in self.domains {
            domains.insert(domain.id, domain.name);
        }
        for list in self.task_lists {
            let key = list.info.key();
            store.insert_task_list(list.info).await;
            store.insert_tasks(&key, list.tasks).await;
            if list.orphaned {
                store.mark_orphaned(&key).await;
            }
        }
        for stray in self.stray_tasks {
            let key = TaskListKey::new(stray.domain_id, stray.name, stray.task_type);
            store.insert_tasks(&key, stray.tasks).await;
        }
    }
}

fn print_summary(pass: u32, report: &PassReport) {
    let elapsed_ms = report
        .finished_at
        .map(|end| (end - report.started_at).num_milliseconds())
        .unwrap_or_default();
    println!(
        "pass {pass} ({}): deleted={} conflicts={} skipped={} undrained={} failed={} \
         tasks_completed={} orphan_tasks_completed={} elapsed_ms={elapsed_ms}",
        report.pass_id,
        report.count(CandidateState::Deleted),
        report.count(CandidateState::DeleteConflict),
        report.count(CandidateState::Skipped),
        report.count(CandidateState::Undrained),
        report.count(CandidateState::Failed),
        report.tasks_completed(),
        report.orphan_tasks_completed,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match &args.config {
        Some(path) => ScavengerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScavengerConfig::default(),
    };

    let fixture = match &args.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::demo(),
    };

    let store = Arc::new(InMemoryTaskListStore::new());
    let domains = Arc::new(StaticDomainCache::new());
    fixture.seed(&store, &domains).await;

    let scavenger = Scavenger::new(store, domains, config);
    scavenger.start();

    let mut escalated = false;
    for pass in 1..=args.passes {
        let report = scavenger.run_pass().await.context("reclamation pass aborted")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_summary(pass, &report);
        }
        for escalation in &report.escalations {
            warn!(task_list = %escalation.task_list, error = %escalation.error, "delete escalated");
        }
        escalated |= !report.escalations.is_empty();
    }

    scavenger.stop();
    info!(passes = args.passes, "scavenger stopped");

    if escalated {
        anyhow::bail!("one or more task list deletes failed");
    }
    Ok(())
}
