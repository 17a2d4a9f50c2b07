//! Observability - tracing の初期化
//!
//! ログレベルは `RUST_LOG` で上書きできます。指定がなければ `default_directive` を使います。

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed (e.g. by
/// another test in the same process); the existing one is kept.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
