//! scavenger-core
//!
//! タスクリスト・スキャベンジャー（キューの GC デーモン）のコア。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_list, errors）
//! - **ports**: 抽象化レイヤー（TaskListStore, DomainCache）
//! - **retry**: リトライポリシーと ThrottleRetry
//! - **app**: アプリケーションロジック（lifecycle, reclaim, scan, pages, report, config）
//! - **impls**: 実装（InMemoryTaskListStore, StaticDomainCache など開発用）
//! - **observability**: tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod retry;

pub use app::{PassReport, Scavenger, ScavengerConfig};
pub use domain::{BackendError, ScavengerError};
