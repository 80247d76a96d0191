//! Loading configuration files from disk.

use std::io::Write;

use route_dispatch::config::{load_config, ConfigError, ValidationError};
use route_dispatch::routing::RoutingMode;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_valid_file() {
    let file = write_config(
        r#"
        [server]
        bind_address = "127.0.0.1:9000"

        [router]
        mode = "last"
        threshold = 0.75

        [[routes]]
        name = "health"
        template = "/health"
        matching_mode = "equals"
        target = { type = "static", body = "ok" }
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.server.bind_address, "127.0.0.1:9000");
    assert_eq!(config.router.mode.name(), RoutingMode::Last.name());
    assert_eq!(config.router.threshold, 0.75);
    assert_eq!(config.routes[0].name, "health");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_syntax_error_is_parse_error() {
    let file = write_config("[router\nthreshold = ");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_unknown_target_type_is_parse_error() {
    let file = write_config(
        r#"
        [[routes]]
        name = "x"
        target = { type = "teleport" }
        "#,
    );
    assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn test_validation_reports_every_error() {
    let file = write_config(
        r#"
        [router]
        threshold = -0.1

        [[routes]]
        name = "a"
        template = "/{x}/{x}"
        target = { type = "echo" }

        [[routes]]
        name = "a"
        target = { type = "echo" }
        "#,
    );

    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
            assert!(matches!(errors[0], ValidationError::ThresholdOutOfRange { .. }));
            let message = ConfigError::Validation(errors).to_string();
            assert!(message.starts_with("Validation failed: "));
        }
        other => panic!("expected validation errors, got {:?}", other.map(|_| ())),
    }
}
