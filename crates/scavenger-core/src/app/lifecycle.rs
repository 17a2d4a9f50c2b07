//! Lifecycle - スキャベンジャーの起動・停止・生存判定
//!
//! # 状態遷移
//! `Initialized → Started → Stopped`（それぞれ一度だけ）
//!
//! - 遷移は compare-and-swap で行うので、同時に `start()` / `stop()` を
//!   呼んでも勝者は一人だけ（他は no-op）
//! - `stop()` は cancel token を発火し、リトライループのバックオフ sleep を中断する

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Initialized,
    Started,
    Stopped,
}

impl LifecycleState {
    const fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Initialized => 0,
            LifecycleState::Started => 1,
            LifecycleState::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Initialized,
            1 => LifecycleState::Started,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Liveness flag plus the cancellation signal shared with every retry loop.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    cancel: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Initialized.as_u8()),
            cancel: CancellationToken::new(),
        }
    }

    /// `Initialized → Started`. Returns `true` for the caller that won.
    pub fn start(&self) -> bool {
        self.transition(LifecycleState::Initialized, LifecycleState::Started)
    }

    /// `Started → Stopped`, then cancels in-flight backoff sleeps.
    ///
    /// No-op on an instance that was never started or is already stopped.
    pub fn stop(&self) -> bool {
        let won = self.transition(LifecycleState::Started, LifecycleState::Stopped);
        if won {
            self.cancel.cancel();
        }
        won
    }

    pub fn is_alive(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Token that fires once [`stop`](Self::stop) wins.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
