//! Tests for server configuration layering.

use std::io::Write;
use strictly_rooms::{DisconnectPolicy, ServerConfig};

#[test]
fn test_defaults() {
    let config = ServerConfig::default();
    assert_eq!(config.host(), "127.0.0.1");
    assert_eq!(*config.port(), 3000);
    assert_eq!(*config.disconnect_policy(), DisconnectPolicy::Indexed);
    assert_eq!(*config.max_name_len(), None);
    assert_eq!(*config.max_chat_len(), None);
    assert_eq!(*config.outlet_capacity(), 256);
    assert!(!config.lock_after_game_end());
    assert_eq!(config.bind_address(), "127.0.0.1:3000");
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = ServerConfig::from_toml("port = 9000\ndisconnect_policy = \"sweep\"\n")
        .expect("Valid config");
    assert_eq!(*config.port(), 9000);
    assert_eq!(*config.disconnect_policy(), DisconnectPolicy::Sweep);
    assert_eq!(config.host(), "127.0.0.1");
    assert_eq!(*config.max_chat_len(), None);
}

#[test]
fn test_message_limits_are_opt_in() {
    let config = ServerConfig::from_toml("max_name_len = 24
max_chat_len = 200
outlet_capacity = 8
")
        .expect("Valid config");
    assert_eq!(*config.max_name_len(), Some(24));
    assert_eq!(*config.max_chat_len(), Some(200));
    assert_eq!(*config.outlet_capacity(), 8);

    let settings = config.session_settings();
    assert_eq!(settings.max_name_len, Some(24));
    assert_eq!(settings.max_chat_len, Some(200));
}

#[test]
fn test_invalid_toml_rejected() {
    assert!(ServerConfig::from_toml("port = \"high\"").is_err());
    assert!(ServerConfig::from_toml("disconnect_policy = \"sometimes\"").is_err());
    assert!(ServerConfig::from_toml("max_name_len = 0").is_err());
    assert!(ServerConfig::from_toml("max_chat_len = 0").is_err());
    assert!(ServerConfig::from_toml("outlet_capacity = 0").is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Temp file");
    writeln!(file, "host = \"0.0.0.0\"").expect("Write");
    writeln!(file, "lock_after_game_end = true").expect("Write");

    let config = ServerConfig::load(Some(file.path())).expect("Loads");
    assert_eq!(config.host(), "0.0.0.0");
    assert!(*config.lock_after_game_end());
    assert!(config.session_settings().lock_after_game_end);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let missing = dir.path().join("absent.toml");
    let err = ServerConfig::load(Some(missing.as_path())).expect_err("Missing file");
    assert!(err.message.contains("Failed to read"));
}

#[test]
fn test_load_without_path_is_default() {
    assert_eq!(ServerConfig::load(None).expect("Defaults"), ServerConfig::default());
}

#[test]
fn test_env_overrides_file() {
    let config = ServerConfig::from_toml("host = \"10.0.0.1\"\nport = 4000")
        .expect("Valid config")
        .with_env_lookup(|name| match name {
            "PORT" => Some("5000".to_string()),
            _ => None,
        })
        .expect("Valid env");
    assert_eq!(config.host(), "10.0.0.1");
    assert_eq!(*config.port(), 5000);
}

#[test]
fn test_invalid_env_port_rejected() {
    let result = ServerConfig::default().with_env_lookup(|name| match name {
        "PORT" => Some("eighty".to_string()),
        _ => None,
    });
    assert!(result.is_err());
}

#[test]
fn test_cli_overrides_everything() {
    let config = ServerConfig::default()
        .with_env_lookup(|name| match name {
            "HOST" => Some("10.0.0.2".to_string()),
            "PORT" => Some("5000".to_string()),
            _ => None,
        })
        .expect("Valid env")
        .with_overrides(Some("::1".to_string()), Some(6000), Some(DisconnectPolicy::Sweep));
    assert_eq!(config.host(), "::1");
    assert_eq!(*config.port(), 6000);
    assert_eq!(*config.disconnect_policy(), DisconnectPolicy::Sweep);

    let unchanged = config.clone().with_overrides(None, None, None);
    assert_eq!(unchanged, config);
}

#[test]
fn test_rendered_toml_reloads() {
    let config = ServerConfig::default()
        .with_overrides(None, Some(7000), Some(DisconnectPolicy::Sweep))
        .with_lock_after_game_end(true);
    let text = config.to_toml().expect("Renders");
    assert!(text.contains("disconnect_policy = \"sweep\""));
    assert_eq!(ServerConfig::from_toml(&text).expect("Reloads"), config);
}
