use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Connect string of a fresh in-memory ensemble
pub fn unique_server() -> String {
    format!("mem-{}:2181", nanoid::nanoid!(8))
}

/// Polls `condition` every 10ms until it holds or `timeout` passes.
/// Returns the last observed value of the condition.
pub async fn wait_until<F, Fut>(
    timeout: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
