use std::path::Path;
use std::sync::Arc;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::ConfigurationError;
use crate::Error;
use crate::ErrorKind;
use crate::ResolverConfig;

fn resolver_in(dir: &Path) -> ResolverConfig {
    ResolverConfig {
        search_dirs: vec![dir.to_path_buf()],
    }
}

fn write(
    dir: &Path,
    name: &str,
    text: &str,
) {
    std::fs::write(dir.join(name), text).unwrap();
}

#[test]
fn property_env_var_name_mapping() {
    assert_eq!(env_var_name("zookeeper.env"), "ZOOKEEPER_ENV");
    assert_eq!(env_var_name("DEV.zookeeper.server"), "DEV_ZOOKEEPER_SERVER");
}

#[test]
#[serial]
fn explicit_property_beats_process_environment() {
    with_vars(vec![("ZOOKEEPER_ENV", Some("from-env"))], || {
        let properties = SystemProperties::new();
        assert_eq!(properties.get("zookeeper.env").as_deref(), Some("from-env"));

        properties.set_property("zookeeper.env", "explicit");
        assert_eq!(properties.get("zookeeper.env").as_deref(), Some("explicit"));

        assert_eq!(properties.remove_property("zookeeper.env").as_deref(), Some("explicit"));
        assert_eq!(properties.get("zookeeper.env").as_deref(), Some("from-env"));
    });
}

#[test]
#[serial]
fn isolated_store_ignores_process_environment() {
    with_vars(vec![("ZOOKEEPER_ENV", Some("from-env"))], || {
        let properties = SystemProperties::isolated();
        assert!(properties.get("zookeeper.env").is_none());
        properties.set_property("zookeeper.env", "   ");
        assert!(properties.get("zookeeper.env").is_none());
    });
}

#[test]
fn properties_take_precedence_over_files() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "zookeeper.properties",
        "zookeeper.env=prod\nPROD.zookeeper.server=file:2181\nPROD.zookeeper.auth=file-auth\n",
    );
    let properties = Arc::new(SystemProperties::isolated());
    properties.set_property("zookeeper.env", "dev");
    properties.set_property("DEV.zookeeper.server", "prop:2181");

    let setting = EnvironmentSetting::new(properties, resolver_in(dir.path()));
    assert_eq!(setting.environment().unwrap(), "DEV");
    assert_eq!(setting.server().unwrap(), "prop:2181");
    assert_eq!(setting.auth().unwrap(), None);
}

#[test]
fn files_resolve_environment_server_and_auth() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "zookeeper.properties",
        "# comment\nzookeeper.env = staging\nSTAGING.zookeeper.auth: user:secret\n",
    );
    write(
        dir.path(),
        "zookeeper_servers.properties",
        "STAGING.zookeeper.server=zk1:2181,zk2:2181\n",
    );

    let setting = EnvironmentSetting::new(Arc::new(SystemProperties::isolated()), resolver_in(dir.path()));
    assert_eq!(setting.environment().unwrap(), "STAGING");
    assert_eq!(setting.server().unwrap(), "zk1:2181,zk2:2181");
    assert_eq!(setting.auth().unwrap().as_deref(), Some("user:secret"));
}

#[test]
fn main_file_server_beats_default_server_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "zookeeper.properties", "QA.zookeeper.server=main:2181\n");
    write(dir.path(), "zookeeper_servers.properties", "QA.zookeeper.server=fallback:2181\n");

    let setting = EnvironmentSetting::for_environment(
        "qa",
        Arc::new(SystemProperties::isolated()),
        resolver_in(dir.path()),
    );
    assert_eq!(setting.environment().unwrap(), "QA");
    assert_eq!(setting.server().unwrap(), "main:2181");
}

#[test]
fn missing_environment_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let setting = EnvironmentSetting::new(Arc::new(SystemProperties::isolated()), resolver_in(dir.path()));

    let e = setting.server().unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Configuration);
    assert!(matches!(
        e,
        Error::Configuration(ConfigurationError::MissingEnvironment)
    ));
}

#[test]
fn missing_server_names_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let setting = EnvironmentSetting::for_environment(
        "dev",
        Arc::new(SystemProperties::isolated()),
        resolver_in(dir.path()),
    );

    match setting.server().unwrap_err() {
        Error::Configuration(ConfigurationError::MissingServer { environment }) => {
            assert_eq!(environment, "DEV")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn resolved_values_are_remembered() {
    let properties = Arc::new(SystemProperties::isolated());
    properties.set_property("DEV.zookeeper.server", "first:2181");
    let dir = tempfile::tempdir().unwrap();
    let setting = EnvironmentSetting::for_environment("dev", properties.clone(), resolver_in(dir.path()));

    assert_eq!(setting.server().unwrap(), "first:2181");
    properties.set_property("DEV.zookeeper.server", "second:2181");
    assert_eq!(setting.server().unwrap(), "first:2181");
}

#[test]
fn malformed_property_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "zookeeper.properties", "zookeeper.env=\\uZZZZ\n");

    let setting = EnvironmentSetting::new(Arc::new(SystemProperties::isolated()), resolver_in(dir.path()));
    assert_eq!(setting.environment().unwrap_err().kind(), ErrorKind::Serialization);
}
