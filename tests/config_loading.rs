//! Tests for loading client configuration from YAML and the environment

use std::collections::HashMap;
use std::path::PathBuf;

use schwab_api_wrapper::{ClientConfig, ConfigError, TokenStoreKind};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn when_yaml_sets_nested_sections_they_override_defaults() {
    // Given: A config file with a file token store and tighter limits
    let yaml = r#"
client_id: app-key
client_secret: app-secret
token_store:
  kind: file
  path: /var/lib/schwab/tokens.json
  encryption_key: passphrase
rate_limit:
  requests_per_minute: 60
retry:
  max_retries: 1
cache:
  quote_ttl_ms: 250
"#;

    // When: It is parsed
    let config = ClientConfig::from_yaml_str(yaml).expect("parse");

    // Then: Set fields are applied and the rest keep their defaults
    assert_eq!(config.client_id, "app-key");
    assert_eq!(config.token_store.kind, TokenStoreKind::File);
    assert_eq!(
        config.token_store.path,
        Some(PathBuf::from("/var/lib/schwab/tokens.json"))
    );
    assert_eq!(config.rate_limit.requests_per_minute, 60);
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.base_delay_ms, 500);
    assert_eq!(config.cache.quote_ttl_ms, 250);
    assert_eq!(config.cache.reference_ttl_ms, 300_000);
    assert_eq!(config.cache.max_entries, 512);
    assert_eq!(config.redirect_uri, "https://127.0.0.1");
    assert!(config.validate().is_ok());
}

#[test]
fn when_environment_supplies_credentials_they_win_over_the_file() {
    // Given: A file with placeholder credentials
    let mut config =
        ClientConfig::from_yaml_str("client_id: from-file\nclient_secret: from-file\n")
            .expect("parse");

    // When: Environment overrides are applied
    config.apply_env_overrides(env(&[
        ("SCHWAB_CLIENT_ID", "from-env"),
        ("SCHWAB_CLIENT_SECRET", "  "),
        ("SCHWAB_TOKEN_PATH", "/tmp/tokens.json"),
    ]));

    // Then: Non-blank variables replace file values
    assert_eq!(config.client_id, "from-env");
    assert_eq!(config.client_secret, "from-file");
    assert_eq!(config.token_store.kind, TokenStoreKind::File);
    assert_eq!(config.token_store.path, Some(PathBuf::from("/tmp/tokens.json")));
}

#[test]
fn when_a_redis_url_is_set_the_redis_store_is_selected() {
    let mut config = ClientConfig::new("app-key", "app-secret");

    config.apply_env_overrides(env(&[("SCHWAB_REDIS_URL", "redis://127.0.0.1:6379")]));

    assert_eq!(config.token_store.kind, TokenStoreKind::Redis);
    assert!(config.validate().is_ok());
}

#[test]
fn when_required_values_are_missing_validation_names_the_field() {
    let cases = [
        ("client_secret: s\n", "client_id"),
        ("client_id: c\n", "client_secret"),
        ("client_id: c\nclient_secret: s\ntoken_store:\n  kind: file\n", "token_store.path"),
        ("client_id: c\nclient_secret: s\ntoken_store:\n  kind: redis\n", "token_store.redis_url"),
    ];

    for (yaml, expected) in cases {
        let config = ClientConfig::from_yaml_str(yaml).expect("parse");
        match config.validate() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, expected, "{yaml}"),
            other => panic!("expected missing {expected}, got {other:?}"),
        }
    }
}

#[test]
fn when_the_redirect_uri_is_not_https_it_is_rejected() {
    let mut config = ClientConfig::new("app-key", "app-secret");
    config.redirect_uri = String::from("http://localhost:8080");

    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { field: "redirect_uri", .. })
    ));
}

#[test]
fn when_the_file_is_not_yaml_loading_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "client_id: [unterminated").expect("write");

    assert!(matches!(ClientConfig::load(&path), Err(ConfigError::Yaml(_))));
}

#[test]
fn when_the_file_is_missing_defaults_are_loaded() {
    // Given: No config file at the path
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.yaml");

    // When: Defaults are read and validated without credentials
    let result = ClientConfig::load(&path);

    // Then: Loading gets as far as validation unless the environment has credentials
    if std::env::var("SCHWAB_CLIENT_ID").is_err() {
        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field: "client_id" })
        ));
    }
}

#[test]
fn when_a_token_path_starts_with_tilde_it_is_under_the_home_directory() {
    // Given: The documented file store example
    let yaml = "client_id: c\nclient_secret: s\ntoken_store:\n  kind: file\n  path: ~/.config/schwab-api-wrapper/tokens.json\n";

    // When: It is parsed
    let config = ClientConfig::from_yaml_str(yaml).expect("parse");

    // Then: No literal `~` directory is used
    let path = config.token_store.path.expect("path");
    assert!(path.ends_with(".config/schwab-api-wrapper/tokens.json"));
    if dirs::home_dir().is_some() {
        assert!(!path.starts_with("~"), "{}", path.display());
        assert!(path.is_absolute());
    }

    // And: Paths without a tilde are left alone
    let mut config = ClientConfig::new("c", "s");
    config.apply_env_overrides(env(&[("SCHWAB_TOKEN_PATH", "relative/tokens.json")]));
    assert_eq!(config.token_store.path, Some(PathBuf::from("relative/tokens.json")));
}
