//! Shared logging bootstrap for sync tests.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install a test-writer subscriber exactly once per test binary.
///
/// The filter comes from `TEST_LOG`, then `RUST_LOG`, and falls back to `"warn"`
/// so passing runs stay quiet. Safe to call from every test.
///
/// ```bash
/// TEST_LOG=game_sync=debug cargo test -p game-sync
/// ```
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}
