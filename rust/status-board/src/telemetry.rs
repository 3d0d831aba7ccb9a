use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

/// Our own events at `info`, dependencies (reqwest, hyper) at `warn`.
const DEFAULT_DIRECTIVES: &str = "warn,status_board=info";
const LOG_ENV: &str = "STATUS_BOARD_LOG";

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber once.
///
/// `STATUS_BOARD_LOG` takes precedence over `RUST_LOG`.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        fmt().with_env_filter(board_filter()).with_target(false).init();
    });
}

fn board_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
