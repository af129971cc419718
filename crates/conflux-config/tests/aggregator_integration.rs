//! End-to-end tests of the aggregator over a real external file.
//!
//! Each test builds its own context and temporary configuration directory,
//! so "restarting the process" means building a fresh aggregator over the
//! same directory.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use conflux_config::{encrypt_value, ConfigurationAggregator, StaticNamingContext};
use conflux_core::{DeleteOutcome, ErrorKind, PutOutcome, StaticSource, SystemProperties};
use tempfile::TempDir;

/// Bootstrap used by the `demo` scenarios.
fn demo_bootstrap(admin: bool) -> String {
    format!("app.name=demo\napp.props.file=demo.properties\napp.props.admin.enabled={admin}\n")
}

/// Creates a config directory holding `demo.properties` with `content`.
fn demo_dir(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo.properties"), content).unwrap();
    dir
}

/// Builds an aggregator that finds `dir` through the system property.
fn demo_aggregator(dir: &Path, admin: bool, system: SystemProperties) -> ConfigurationAggregator {
    ConfigurationAggregator::builder()
        .with_bootstrap_str("demo", demo_bootstrap(admin))
        .with_system_properties(system.with("demo.config.dir", dir.display().to_string()))
        .with_file_provider()
        .build()
}

fn read_file(dir: &Path) -> String {
    fs::read_to_string(dir.join("demo.properties")).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_demo_scenario_admin_enabled() {
    let dir = demo_dir("greeting=hello\n");
    let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());

    assert!(aggregator.initialize().is_ok());
    assert_eq!(aggregator.get("greeting").as_deref(), Some("hello"));

    assert_eq!(aggregator.put("greeting", "hi").unwrap(), PutOutcome::Updated);
    assert_eq!(aggregator.get("greeting").as_deref(), Some("hi"));
    assert!(read_file(dir.path()).lines().any(|line| line == "greeting=hi"));
}

#[test]
fn test_demo_scenario_admin_disabled() {
    let dir = demo_dir("greeting=hello\n");
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());

    assert_eq!(aggregator.get("greeting").as_deref(), Some("hello"));
    assert_eq!(aggregator.put("greeting", "hi").unwrap(), PutOutcome::Rejected);

    assert_eq!(aggregator.get("greeting").as_deref(), Some("hello"));
    assert_eq!(read_file(dir.path()), "greeting=hello\n");
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_later_source_overwrites_earlier() {
    let dir = demo_dir("shared=from-file\nfile.only=1\n");
    let aggregator = ConfigurationAggregator::builder()
        .with_bootstrap_str("demo", demo_bootstrap(false))
        .with_system_properties(
            SystemProperties::new().with("demo.config.dir", dir.path().display().to_string()),
        )
        .with_file_provider()
        .with_source(Arc::new(StaticSource::from_pairs(
            "overrides",
            [("shared", "from-overrides")],
        )))
        .build();

    assert_eq!(aggregator.get("shared").as_deref(), Some("from-overrides"));
    assert_eq!(aggregator.get("file.only").as_deref(), Some("1"));
}

#[test]
fn test_refresh_is_idempotent() {
    let dir = demo_dir("a=1\nb=2\n");
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());

    aggregator.refresh();
    let first = aggregator.get_all();
    aggregator.refresh();
    assert_eq!(aggregator.get_all(), first);
}

#[test]
fn test_refresh_picks_up_external_edits() {
    let dir = demo_dir("a=1\n");
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());
    assert_eq!(aggregator.get("a").as_deref(), Some("1"));

    fs::write(dir.path().join("demo.properties"), "a=2\nb=3\n").unwrap();
    assert_eq!(aggregator.refresh(), 0);

    assert_eq!(aggregator.get("a").as_deref(), Some("2"));
    assert_eq!(aggregator.get("b").as_deref(), Some("3"));
}

#[test]
fn test_config_dir_entry_is_exposed() {
    let dir = demo_dir("a=1\n");
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());

    assert_eq!(
        aggregator.get("demo.config.dir"),
        Some(dir.path().display().to_string())
    );
}

#[test]
fn test_directory_from_naming_registry() {
    let dir = demo_dir("greeting=hello\n");
    let aggregator = ConfigurationAggregator::builder()
        .with_bootstrap_str("demo", demo_bootstrap(false))
        .with_system_properties(SystemProperties::new())
        .with_naming(StaticNamingContext::new().bind(
            "java:global/jbeans/demo/ENVIRONMENT_PROPERTIES_PATH",
            dir.path().display().to_string(),
        ))
        .with_file_provider()
        .build();

    assert_eq!(aggregator.get("greeting").as_deref(), Some("hello"));
}

#[test]
fn test_missing_directory_leaves_bootstrap_only() {
    let aggregator = ConfigurationAggregator::builder()
        .with_bootstrap_str("demo", demo_bootstrap(false))
        .with_system_properties(SystemProperties::new())
        .with_file_provider()
        .build();

    assert!(aggregator.initialize().is_ok());
    assert_eq!(aggregator.refresh(), 1);
    assert_eq!(aggregator.get("app.name").as_deref(), Some("demo"));
    assert!(aggregator.get("greeting").is_none());
}

#[test]
fn test_missing_file_contributes_nothing() {
    let dir = TempDir::new().unwrap();
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());

    assert_eq!(aggregator.refresh(), 1);
    assert!(aggregator.get("demo.config.dir").is_none());
}

// ============================================================================
// Mutation round-trips
// ============================================================================

#[test]
fn test_put_survives_restart() {
    let dir = demo_dir("existing=1\n");
    {
        let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());
        assert_eq!(aggregator.put("fresh", "value").unwrap(), PutOutcome::Created);
        assert_eq!(aggregator.get("fresh").as_deref(), Some("value"));
    }

    let restarted = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert_eq!(restarted.get("fresh").as_deref(), Some("value"));
    assert_eq!(restarted.get("existing").as_deref(), Some("1"));
}

#[test]
fn test_put_round_trips_special_characters() {
    let dir = demo_dir("");
    let value = "a=b: #not a comment\\ and\ttab";
    {
        let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());
        aggregator.put("odd key", value).unwrap();
    }

    let restarted = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert_eq!(restarted.get("odd key").as_deref(), Some(value));
}

#[test]
fn test_delete_survives_restart() {
    let dir = demo_dir("doomed=1\nkept=2\n");
    {
        let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());
        assert_eq!(aggregator.delete("doomed").unwrap(), DeleteOutcome::Deleted);
        assert!(aggregator.get("doomed").is_none());
        assert_eq!(aggregator.delete("never-there").unwrap(), DeleteOutcome::NotFound);
    }

    let restarted = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert!(restarted.get("doomed").is_none());
    assert_eq!(restarted.get("kept").as_deref(), Some("2"));
    assert!(read_file(dir.path()).starts_with("# -- property: doomed was deleted at runtime on: "));
}

#[test]
fn test_admin_disabled_never_touches_file_or_map() {
    let dir = demo_dir("a=1\n");
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());
    let before = aggregator.get_all();

    assert_eq!(aggregator.put("a", "2").unwrap(), PutOutcome::Rejected);
    assert_eq!(aggregator.put("b", "2").unwrap(), PutOutcome::Rejected);
    assert_eq!(aggregator.delete("a").unwrap(), DeleteOutcome::Rejected);

    assert_eq!(aggregator.get_all(), before);
    assert_eq!(read_file(dir.path()), "a=1\n");
}

#[test]
fn test_persistence_failure_leaves_map_untouched() {
    let dir = demo_dir("a=1\n");
    let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert_eq!(aggregator.get("a").as_deref(), Some("1"));

    fs::remove_file(dir.path().join("demo.properties")).unwrap();
    let err = aggregator.put("a", "2").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PersistenceFailed);
    assert_eq!(aggregator.get("a").as_deref(), Some("1"));
}

// ============================================================================
// Encrypted values
// ============================================================================

#[test]
fn test_encrypted_value_with_key() {
    let wrapped = encrypt_value("k3y", "abc123").unwrap();
    let dir = demo_dir(&format!("db.password={wrapped}\nplain=x\n"));
    let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new().with("eKey", "k3y"));

    assert_eq!(aggregator.get("db.password").as_deref(), Some("abc123"));
    assert_eq!(aggregator.get("plain").as_deref(), Some("x"));

    aggregator.put("plain", "y").unwrap();
    assert!(read_file(dir.path()).contains(&format!("db.password={wrapped}")));
}

#[test]
fn test_encrypted_value_with_named_key_property() {
    let wrapped = encrypt_value("k3y", "abc123").unwrap();
    let dir = demo_dir(&format!("db.password={wrapped}\n"));
    let aggregator = ConfigurationAggregator::builder()
        .with_bootstrap_str(
            "demo",
            format!("{}app.props.encKey.name=demoKey\n", demo_bootstrap(false)),
        )
        .with_system_properties(
            SystemProperties::new()
                .with("demo.config.dir", dir.path().display().to_string())
                .with("demoKey", "k3y"),
        )
        .with_file_provider()
        .build();

    assert_eq!(aggregator.get("db.password").as_deref(), Some("abc123"));
}

#[test]
fn test_encrypted_value_without_key_contributes_nothing() {
    let wrapped = encrypt_value("k3y", "abc123").unwrap();
    let dir = demo_dir(&format!("db.password={wrapped}\nplain=x\n"));
    let aggregator = demo_aggregator(dir.path(), false, SystemProperties::new());

    assert!(aggregator.initialize().is_ok());
    assert!(aggregator.get("db.password").is_none());
    assert!(aggregator.get("plain").is_none());
    assert_eq!(aggregator.get("app.name").as_deref(), Some("demo"));
}

#[test]
fn test_put_of_marker_text_without_key_keeps_file_loadable() {
    let dir = demo_dir("greeting=hello\n");
    {
        let aggregator = demo_aggregator(dir.path(), true, SystemProperties::new());
        let err = aggregator.put("note", "see ENC(docs)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDecryptionKey);
        assert!(aggregator.get("note").is_none());
    }

    let restarted = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert_eq!(restarted.get("greeting").as_deref(), Some("hello"));
}

#[test]
fn test_put_of_undecryptable_value_is_refused() {
    let dir = demo_dir("greeting=hello\n");
    let system = || SystemProperties::new().with("eKey", "k3y");
    {
        let aggregator = demo_aggregator(dir.path(), true, system());
        let err = aggregator.put("secret", "ENC(abc)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    }

    let restarted = demo_aggregator(dir.path(), true, system());
    assert_eq!(restarted.get("greeting").as_deref(), Some("hello"));
    assert!(restarted.get("secret").is_none());
}

#[test]
fn test_put_of_encrypted_value_reads_back_as_plaintext() {
    let wrapped = encrypt_value("k3y", "abc123").unwrap();
    let dir = demo_dir("");
    let system = || SystemProperties::new().with("eKey", "k3y");
    {
        let aggregator = demo_aggregator(dir.path(), true, system());
        assert_eq!(aggregator.put("db.password", &wrapped).unwrap(), PutOutcome::Created);
        assert_eq!(aggregator.get("db.password").as_deref(), Some("abc123"));
    }

    assert!(read_file(dir.path()).contains(&format!("db.password={wrapped}")));
    let restarted = demo_aggregator(dir.path(), true, system());
    assert_eq!(restarted.get("db.password").as_deref(), Some("abc123"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_reads_during_refresh_never_see_missing_keys() {
    let dir = demo_dir("a=1\nb=1\n");
    let aggregator = Arc::new(demo_aggregator(dir.path(), false, SystemProperties::new()));
    assert!(aggregator.initialize().is_ok());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let aggregator = Arc::clone(&aggregator);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let a = aggregator.get("a");
                    assert!(matches!(a.as_deref(), Some("1" | "2")), "torn read: {a:?}");
                    assert_eq!(aggregator.get("b").as_deref(), Some("1"));
                }
            })
        })
        .collect();

    let file = dir.path().join("demo.properties");
    for i in 0..50 {
        let value = if i % 2 == 0 { "2" } else { "1" };
        fs::write(&file, format!("a={value}\nb=1\n")).unwrap();
        assert_eq!(aggregator.refresh(), 0);
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(aggregator.unconfigured_keys().is_empty());
}

#[test]
fn test_concurrent_puts_keep_file_and_map_in_step() {
    let dir = demo_dir("");
    let aggregator = Arc::new(demo_aggregator(dir.path(), true, SystemProperties::new()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let aggregator = Arc::clone(&aggregator);
            std::thread::spawn(move || {
                aggregator.put("contended", &i.to_string()).unwrap();
                aggregator.put(&format!("key{i}"), "v").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let restarted = demo_aggregator(dir.path(), true, SystemProperties::new());
    assert_eq!(restarted.get("contended"), aggregator.get("contended"));
    for i in 0..16 {
        assert_eq!(restarted.get(&format!("key{i}")).as_deref(), Some("v"));
    }
}
