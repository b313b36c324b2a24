use std::sync::Arc;

use super::*;
use crate::session::memory::MemorySessionFactory;
use crate::test_utils::enable_logger;
use crate::test_utils::unique_server;
use crate::ActionMonitor;
use crate::ErrorKind;
use crate::MonitorConfig;
use crate::ResolverConfig;
use crate::SessionConfig;
use crate::SessionRegistry;
use crate::SystemProperties;

fn facade(
    properties: Arc<SystemProperties>,
    dir: &std::path::Path,
) -> ZkFacade {
    enable_logger();
    ZkFacade::new(
        Arc::new(SessionRegistry::new(
            Arc::new(MemorySessionFactory),
            SessionConfig::default(),
        )),
        Arc::new(ActionMonitor::new(&MonitorConfig::default())),
        properties,
        ResolverConfig {
            search_dirs: vec![dir.to_path_buf()],
        },
    )
}

#[tokio::test]
async fn default_client_uses_configured_environment() {
    let dir = tempfile::tempdir().unwrap();
    let server = unique_server();
    let properties = Arc::new(SystemProperties::isolated());
    properties.set_property("zookeeper.env", "dev");
    properties.set_property("DEV.zookeeper.server", server.clone());
    let facade = facade(properties, dir.path());

    let client = facade.client().unwrap();
    assert_eq!(client.environment(), "DEV");
    assert_eq!(client.server(), server);
    assert!(client.exists("/").await.unwrap());

    let again = facade.client().unwrap();
    assert_eq!(facade.registry().ref_count(&server, None), 2);
    client.close().unwrap();
    again.close().unwrap();
    assert!(facade.registry().is_empty());
}

#[tokio::test]
async fn explicit_environment_reads_its_own_keys() {
    let dir = tempfile::tempdir().unwrap();
    let server = unique_server();
    std::fs::write(
        dir.path().join("zookeeper_servers.properties"),
        format!("PROD.zookeeper.server={server}\n"),
    )
    .unwrap();
    let properties = Arc::new(SystemProperties::isolated());
    properties.set_property("PROD.zookeeper.auth", "ops:secret");
    let facade = facade(properties, dir.path());

    let client = facade.client_for_env("prod").unwrap();
    assert_eq!(client.environment(), "PROD");
    assert_eq!(facade.registry().ref_count(&server, Some("ops:secret")), 1);
    assert_eq!(facade.registry().ref_count(&server, None), 0);
    client.close().unwrap();
}

#[tokio::test]
async fn missing_configuration_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(Arc::new(SystemProperties::isolated()), dir.path());

    assert_eq!(facade.client().unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(
        facade.client_for_env("nowhere").unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert!(facade.registry().is_empty());
}

#[tokio::test]
async fn server_bound_client_has_empty_environment() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(Arc::new(SystemProperties::isolated()), dir.path());
    let server = unique_server();

    let client = facade.client_for_server(&server, None).unwrap();
    assert_eq!(client.environment(), "");
    assert_eq!(client.server(), server);
    client.close().unwrap();

    let e = facade.client_for_server(" ", None).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Programmer);
}
