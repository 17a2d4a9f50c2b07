//! App - アプリケーション層
//!
//! ports を組み合わせてスキャベンジャーのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Lifecycle**: 起動・停止・生存判定（リトライの唯一の継続条件）
//! - **Scavenger**: ports とリトライポリシーの束ね役
//! - **reclaim**: バックエンド操作ごとのラッパー（retry forever / delete retry）
//! - **scan**: 1 回のパス（orphan 検出 → drain → fenced delete）
//! - **TaskListPages**: `list_task_list` のページング
//! - **PassReport**: パスの結果

pub mod config;
pub mod lifecycle;
pub mod pages;
pub mod reclaim;
pub mod report;
pub mod scan;
pub mod scavenger;

pub use self::config::{ConfigError, ScavengerConfig};
pub use self::lifecycle::{Lifecycle, LifecycleState};
pub use self::pages::TaskListPages;
pub use self::reclaim::DeleteOutcome;
pub use self::report::{AuditReport, CandidateReport, CandidateState, Escalation, PassReport};
pub use self::scavenger::Scavenger;
