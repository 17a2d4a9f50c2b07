//! Impls - ports の実装（開発・テスト用）
//!
//! - **InMemoryTaskListStore**: TaskListStore のインメモリ実装（フォールト注入つき）
//! - **StaticDomainCache**: DomainCache の固定テーブル実装

pub mod domain_cache;
pub mod inmem_store;

pub use self::domain_cache::StaticDomainCache;
pub use self::inmem_store::{InMemoryTaskListStore, StoreCall, StoreOp};
