//! Integration tests for configuration loader
//!
//! Tests that a loaded file configures every adapter without further input.

use std::io::Write;
use std::path::PathBuf;

use meshport_domain::MeshportError;
use meshport_infra::{config, CatalogClient, MeshExportClient, TokenExchangeClient};
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_loaded_toml_config_builds_adapters() {
    let path = write_config(
        r#"
[auth]
client_id = "native-integration"
redirect_uri = "http://localhost:3000/signin-callback"
authorization_url = "https://ims.bentley.com/connect/authorize"
token_url = "https://ims.bentley.com/connect/token"
scopes = ["itwin-platform", "offline_access"]
token_timeout_secs = 15

[catalog]
base_url = "https://api.bentley.com/"
accept_header = "application/vnd.bentley.itwin-platform.v1+json"
page_size = 25

[logging]
level = "meshport_infra=debug,info"
json = true
"#,
        "toml",
    );

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(path).ok();

    let config = result.expect("Failed to load config from TOML file");
    config.validate().expect("loaded config should validate");

    assert_eq!(config.auth.scope_string(), "itwin-platform offline_access");
    assert_eq!(config.auth.token_timeout_secs, 15);
    assert_eq!(config.catalog.page_size, 25);
    assert_eq!(config.export.export_type, "3DTiles");

    assert!(TokenExchangeClient::new(&config.auth).is_ok());
    assert!(MeshExportClient::from_config(&config.export).is_ok());
    assert!(CatalogClient::from_config(&config.catalog).is_ok());
}

#[test]
fn test_loaded_config_without_client_id_fails_validation() {
    let path = write_config(
        r#"{
            "auth": {
                "client_id": "",
                "redirect_uri": "http://localhost:3000/signin-callback",
                "authorization_url": "https://ims.bentley.com/connect/authorize",
                "token_url": "https://ims.bentley.com/connect/token",
                "scopes": ["itwin-platform"]
            }
        }"#,
        "json",
    );

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(path).ok();

    let config = result.expect("file parses even with an empty client id");
    match config.validate() {
        Err(MeshportError::Config(msg)) => assert!(msg.contains("client_id")),
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/meshport.json".into()));

    match result {
        Err(MeshportError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_toml() {
    let path = write_config("[auth\nclient_id = ", "toml");

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(path).ok();

    match result {
        Err(MeshportError::Config(msg)) => assert!(msg.contains("Invalid TOML")),
        other => panic!("Expected Config error, got {other:?}"),
    }
}
