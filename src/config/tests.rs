use std::io::Write;

use super::*;

fn raw_defaults() -> RawSettings {
    RawSettings::default()
}

#[test]
fn defaults_match_editor_constants() {
    let settings = Settings::from_raw(raw_defaults()).expect("valid settings");

    assert_eq!(settings.editor.title_debounce, Duration::from_millis(1500));
    assert_eq!(settings.editor.content_debounce, Duration::from_millis(2000));
    assert_eq!(settings.editor.autosave_interval, Duration::from_secs(10));
    assert_eq!(settings.editor.max_failures.get(), 5);
    assert_eq!(settings.editor.load_timeout, Duration::from_secs(10));
    assert_eq!(settings.breaker.max_failures.get(), 5);
    assert_eq!(settings.breaker.cooldown, Duration::from_secs(300));
    assert_eq!(settings.uploads.max_image_bytes.get(), 5 * 1024 * 1024);
    assert_eq!(settings.api.timeout, Duration::from_secs(30));
    assert!(settings.api.base_url.is_none());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_defaults();
    raw.api.base_url = Some("https://file.example.com".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        api_base_url: Some("https://cli.example.com/prod".to_string()),
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_global_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.api.base_url.as_deref(),
        Some("https://cli.example.com/prod")
    );
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn editor_overrides_feed_policy_and_timings() {
    let mut raw = raw_defaults();
    raw.apply_editor_overrides(&EditorOverrides {
        title_debounce_ms: Some(300),
        autosave_interval_seconds: Some(2),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.editor.timings().title_debounce,
        Duration::from_millis(300)
    );
    assert_eq!(
        settings.editor.autosave_policy().min_interval,
        Duration::from_secs(2)
    );
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = raw_defaults();
    raw.breaker.cooldown_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero cooldown");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "breaker.cooldown_seconds",
            ..
        }
    ));

    let mut raw = raw_defaults();
    raw.editor.max_failures = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero failures");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "editor.max_failures",
            ..
        }
    ));
}

#[test]
fn base_url_must_be_http() {
    let mut raw = raw_defaults();
    raw.api.base_url = Some("ftp://example.com".to_string());
    let err = Settings::from_raw(raw).expect_err("ftp rejected");
    insta::assert_snapshot!(err.to_string(), @"invalid configuration for `api.base_url`: scheme must be http or https");

    let mut raw = raw_defaults();
    raw.api.base_url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("blank treated as unset");
    assert!(settings.api.base_url.is_none());
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = raw_defaults();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn config_file_layer_is_read() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        "[api]\nbase_url = \"https://api.example.com\"\n\n[breaker]\ncooldown_seconds = 60"
    )
    .expect("write config");

    let path = file.path().to_str().expect("utf-8 path").to_string();
    let args = CliArgs::parse_from(["drafthouse", "--config-file", &path, "publish", "post.md"]);
    let settings = load(&args).expect("load settings");

    assert_eq!(
        settings.api.base_url.as_deref(),
        Some("https://api.example.com")
    );
    assert_eq!(settings.breaker.cooldown, Duration::from_secs(60));
}

#[test]
fn parse_edit_arguments() {
    let args = CliArgs::parse_from([
        "drafthouse",
        "edit",
        "--id",
        "d1",
        "--publish-on-exit",
        "--poll-interval-ms",
        "250",
        "--log-level",
        "debug",
        "post.md",
    ]);

    assert_eq!(args.overrides.log_level.as_deref(), Some("debug"));
    match args.command {
        Command::Edit(edit) => {
            assert_eq!(edit.id.as_deref(), Some("d1"));
            assert!(edit.publish_on_exit);
            assert_eq!(edit.overrides.poll_interval_ms, Some(250));
            assert_eq!(edit.file, std::path::Path::new("post.md"));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_upload_image_arguments() {
    let args = CliArgs::parse_from([
        "drafthouse",
        "upload-image",
        "--draft",
        "d1",
        "--index",
        "3",
        "cover.png",
    ]);

    match args.command {
        Command::UploadImage(upload) => {
            assert_eq!(upload.draft, "d1");
            assert_eq!(upload.index, 3);
            assert_eq!(upload.file, std::path::Path::new("cover.png"));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}
