use std::path::PathBuf;

use serial_test::serial;

use super::*;
use crate::application::auth::hash_token;

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("quire-{}-{name}.toml", std::process::id()));
    std::fs::write(&path, contents).expect("write config file");
    path
}

#[test]
fn defaults_apply_without_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.pagination.page_size.get(), 4);
    assert_eq!(settings.site.title, "Quire");
    assert!(settings.auth.credentials.is_empty());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.pagination.page_size = Some(10);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        page_size: Some(2),
        site_title: Some("Notebook".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.pagination.page_size.get(), 2);
    assert_eq!(settings.site.title, "Notebook");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_database_url_means_memory_store() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.pagination.page_size = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "pagination.page_size",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.port",
            ..
        })
    ));
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid level");
    assert!(err.to_string().starts_with("invalid configuration for `logging.level`"));
}

#[test]
fn credentials_are_validated() {
    let mut raw = RawSettings::default();
    raw.auth.credentials = vec![RawCredential {
        name: "admin".to_string(),
        token_sha256: "abc".to_string(),
        admin: true,
    }];

    let err = Settings::from_raw(raw).expect_err("malformed digest");
    insta::assert_snapshot!(
        err.to_string(),
        @"invalid configuration for `auth.credentials`: token digest for `admin` must be 64 hexadecimal characters"
    );
}

#[test]
fn duplicate_credential_names_are_rejected() {
    let digest = hash_token("secret");
    let mut raw = RawSettings::default();
    raw.auth.credentials = vec![
        RawCredential {
            name: "admin".to_string(),
            token_sha256: digest.clone(),
            admin: true,
        },
        RawCredential {
            name: "admin".to_string(),
            token_sha256: digest,
            admin: false,
        },
    ];

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "auth.credentials",
            ..
        })
    ));
}

#[test]
#[serial]
fn config_file_and_environment_are_layered() {
    let digest = hash_token("admin-secret");
    let path = write_config(
        "layered",
        &format!(
            r#"
[server]
port = 9000

[site]
title = "From file"

[[auth.credentials]]
name = "admin"
token_sha256 = "{digest}"
admin = true
"#
        ),
    );

    // SAFETY: guarded by `#[serial]`; no other test touches the process environment concurrently.
    unsafe {
        std::env::set_var("QUIRE__SERVER__PORT", "9100");
    }

    let cli = CliArgs::parse_from([
        "quire",
        "--config-file",
        path.to_str().expect("utf-8 path"),
        "serve",
        "--site-title",
        "From CLI",
    ]);
    let result = load(&cli);

    unsafe {
        std::env::remove_var("QUIRE__SERVER__PORT");
    }
    let _ = std::fs::remove_file(&path);

    let settings = result.expect("settings load");
    assert_eq!(settings.server.addr.port(), 9100);
    assert_eq!(settings.site.title, "From CLI");
    assert_eq!(settings.auth.credentials.len(), 1);
    assert!(settings.auth.credentials[0].is_admin());
}

#[test]
#[serial]
fn missing_config_file_is_an_error() {
    let cli = CliArgs::parse_from(["quire", "--config-file", "/nonexistent/quire.toml"]);
    assert!(matches!(load(&cli), Err(LoadError::Build(_))));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quire"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["quire", "migrate", "--database-url", "postgres://example"]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_hash_token_arguments() {
    let args = CliArgs::parse_from(["quire", "hash-token", "s3cret"]);

    match args.command.expect("hash-token command") {
        Command::HashToken(hash) => assert_eq!(hash.token, "s3cret"),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "quire",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--log-json",
        "yes",
        "--page-size",
        "12",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.log_json, Some(true));
            assert_eq!(serve.overrides.page_size, Some(12));
        }
        _ => panic!("wrong command parsed"),
    }
}
