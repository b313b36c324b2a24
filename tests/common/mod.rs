use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use zk_facade::session::memory::MemorySessionFactory;
use zk_facade::ActionKind;
use zk_facade::ActionMonitor;
use zk_facade::ActionRecord;
use zk_facade::BoxError;
use zk_facade::MonitorConfig;
use zk_facade::ResolverConfig;
use zk_facade::SessionConfig;
use zk_facade::SessionRegistry;
use zk_facade::SystemProperties;
use zk_facade::ZkFacade;

pub const FLUSH: Duration = Duration::from_secs(5);
pub const WAIT: Duration = Duration::from_secs(5);

/// Facade over a private registry and monitor, with a recorder subscribed
pub struct TestFacade {
    pub facade: ZkFacade,
    pub records: Arc<Mutex<Vec<ActionRecord>>>,
    pub server: String,
}

impl TestFacade {
    pub fn new() -> Self {
        crate::enable_logger();
        let monitor = Arc::new(ActionMonitor::new(&MonitorConfig::default()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        monitor.add_subscriber(Arc::new(move |r: &ActionRecord| -> Result<(), BoxError> {
            sink.lock().push(r.clone());
            Ok(())
        }));

        let facade = ZkFacade::new(
            Arc::new(SessionRegistry::new(
                Arc::new(MemorySessionFactory),
                SessionConfig::default(),
            )),
            monitor,
            Arc::new(SystemProperties::isolated()),
            ResolverConfig { search_dirs: vec![] },
        );
        Self {
            facade,
            records,
            server: format!("it-{}:2181", nanoid::nanoid!(8)),
        }
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        assert!(self.facade.monitor().flush(FLUSH));
        self.records.lock().iter().map(|r| r.kind).collect()
    }
}

pub async fn wait_until<F, Fut>(
    timeout: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
