use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bundlepush_core::{PackageMetadata, PendingUpdateRecord};
use bundlepush_runtime::{LifecycleState, ResolvedBundle};
use bundlepush_security::sha256_hex;
use clap::error::ErrorKind;
use clap::Parser;

use super::*;
use crate::completion::write_completions_script;
use crate::dispatch::{collect_status, open_context, run_install, run_launch};
use crate::render::{
    format_launch_lines, format_status_lines, render_status_line, LaunchReport, ModuleLaunch,
    ModuleStatus, OutputStyle,
};

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "bundlepush-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

fn write_config(root: &Path) -> PathBuf {
    fs::create_dir_all(root).expect("must create root");
    let path = root.join("bundlepush.toml");
    fs::write(
        &path,
        "[identity]\nversion = \"2.4.0\"\nbuild_time = 1700000000000\n",
    )
    .expect("must write config");
    path
}

fn write_bundle(root: &Path, contents: &str) -> PathBuf {
    let dir = root.join("download");
    fs::create_dir_all(&dir).expect("must create download dir");
    fs::write(dir.join("index.android.bundle"), contents).expect("must write bundle");
    dir
}

#[test]
fn cli_parses_install_with_defaults() {
    let cli = Cli::try_parse_from(["bundlepush", "install", "--bundle-dir", "/tmp/pkg"])
        .expect("must parse");
    match cli.command {
        Commands::Install {
            module,
            bundle_dir,
            hash,
            label,
            mandatory,
        } => {
            assert_eq!(module, DEFAULT_MODULE_NAME);
            assert_eq!(bundle_dir, PathBuf::from("/tmp/pkg"));
            assert!(hash.is_none());
            assert!(label.is_none());
            assert!(!mandatory);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert_eq!(cli.log_level, "warn");
}

#[test]
fn cli_requires_bundle_dir_for_install() {
    let err = Cli::try_parse_from(["bundlepush", "install"]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_parses_global_overrides_and_completions() {
    let cli = Cli::try_parse_from([
        "bundlepush",
        "--root",
        "/data/updates",
        "--log-level",
        "debug",
        "completions",
        "zsh",
    ])
    .expect("must parse");
    assert_eq!(cli.root, Some(PathBuf::from("/data/updates")));
    assert_eq!(cli.log_level, "debug");
    assert!(matches!(
        cli.command,
        Commands::Completions { shell: Shell::Zsh }
    ));
}

#[test]
fn completions_script_mentions_binary_name() {
    let mut out = Vec::new();
    write_completions_script(Shell::Bash, &mut out).expect("must generate");
    let script = String::from_utf8(out).expect("utf8");
    assert!(script.contains("bundlepush"));
    assert!(script.contains("package-folder"));
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "index.android: updates cleared"),
        "index.android: updates cleared"
    );
}

#[test]
fn render_status_line_rich_includes_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed abc"),
        "[OK] installed abc"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "rolled back"),
        "[WARN] rolled back"
    );
}

#[test]
fn launch_lines_report_source_and_flags() {
    let report = LaunchReport {
        modules: vec![ModuleLaunch {
            module: "index.android".to_string(),
            state: LifecycleState::PendingCrashed,
            bundle: ResolvedBundle {
                path: "assets://index.android.bundle".to_string(),
                is_binary: true,
            },
        }],
        did_update: false,
        is_running_binary_version: true,
        need_to_report_rollback: true,
    };

    let lines = format_launch_lines(&report, OutputStyle::Rich);
    assert_eq!(
        lines,
        vec![
            "[WARN] index.android: binary bundle assets://index.android.bundle (state=rolled-back)"
                .to_string(),
            "did_update=false".to_string(),
            "is_running_binary_version=true".to_string(),
            "need_to_report_rollback=true".to_string(),
        ]
    );
}

#[test]
fn status_lines_list_pointers_and_history() {
    let failed = PackageMetadata::new("bad").with_label("v7");
    let status = ModuleStatus {
        module: "index.android".to_string(),
        current: Some("good".to_string()),
        previous: None,
        pending: Some(PendingUpdateRecord::new("good", true)),
        failed: vec![failed],
    };

    assert_eq!(
        format_status_lines(&status),
        vec![
            "module: index.android",
            "current: good",
            "previous: -",
            "pending: good (loading=true)",
            "failed: bad (v7)",
        ]
    );
}

#[test]
fn load_config_applies_root_override() {
    let root = test_root();
    let config_path = write_config(&root);

    let config = load_config(Some(&config_path), Some(root.join("store"))).expect("must load");
    assert_eq!(config.storage_root, root.join("store"));
    assert_eq!(config.identity.version.as_deref(), Some("2.4.0"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn load_config_reports_missing_file() {
    let root = test_root();
    let err = load_config(Some(&root.join("absent.toml")), None).expect_err("must fail");
    assert!(
        format!("{err:#}").contains("failed to load config"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn open_context_without_identity_fails() {
    let root = test_root();
    let err = open_context(None, Some(root.clone()), false).expect_err("must fail");
    assert!(
        format!("{err:#}").contains("identity"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn install_launch_ready_flow() {
    let root = test_root();
    let config_path = write_config(&root);
    let store = root.join("store");
    let bundle_dir = write_bundle(&root, "console.log('v2')");

    {
        let context =
            open_context(Some(&config_path), Some(store.clone()), false).expect("must attach");
        let metadata = run_install(
            &context,
            DEFAULT_MODULE_NAME,
            &bundle_dir,
            None,
            Some("v2".to_string()),
            true,
        )
        .expect("must install");
        assert_eq!(metadata.package_hash, sha256_hex(b"console.log('v2')"));
        assert_eq!(metadata.app_version.as_deref(), Some("2.4.0"));
        assert_eq!(metadata.binary_modified_time.as_deref(), Some("1700000000000"));
        assert!(metadata.is_mandatory());
        assert_eq!(metadata.label(), Some("v2"));
    }

    let hash = sha256_hex(b"console.log('v2')");
    {
        let context =
            open_context(Some(&config_path), Some(store.clone()), true).expect("must open");
        let report = run_launch(&context, None).expect("must launch");
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].state, LifecycleState::PendingFirstRun);
        assert!(!report.modules[0].bundle.is_binary);
        assert!(report.did_update);
        assert!(!report.is_running_binary_version);
    }

    {
        let context =
            open_context(Some(&config_path), Some(store.clone()), false).expect("must attach");
        context
            .notify_application_ready(DEFAULT_MODULE_NAME)
            .expect("must confirm");
        let status = collect_status(&context, DEFAULT_MODULE_NAME).expect("must read status");
        assert_eq!(status.current.as_deref(), Some(hash.as_str()));
        assert!(status.pending.is_none());
        assert!(status.failed.is_empty());
    }

    let context = open_context(Some(&config_path), Some(store), true).expect("must open");
    let report = run_launch(&context, Some(DEFAULT_MODULE_NAME)).expect("must launch");
    assert_eq!(report.modules[0].state, LifecycleState::NoPendingUpdate);
    assert!(!report.modules[0].bundle.is_binary);
    assert!(!report.need_to_report_rollback);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn relaunch_without_ready_reports_rollback() {
    let root = test_root();
    let config_path = write_config(&root);
    let store = root.join("store");
    let bundle_dir = write_bundle(&root, "console.log('broken')");

    {
        let context =
            open_context(Some(&config_path), Some(store.clone()), false).expect("must attach");
        run_install(
            &context,
            DEFAULT_MODULE_NAME,
            &bundle_dir,
            Some("broken".to_string()),
            None,
            false,
        )
        .expect("must install");
    }
    drop(open_context(Some(&config_path), Some(store.clone()), true).expect("first run"));

    let context = open_context(Some(&config_path), Some(store), true).expect("must open");
    let report = run_launch(&context, None).expect("must launch");
    assert_eq!(report.modules[0].state, LifecycleState::PendingCrashed);
    assert!(report.modules[0].bundle.is_binary);
    assert!(report.need_to_report_rollback);

    let status = collect_status(&context, DEFAULT_MODULE_NAME).expect("must read status");
    assert_eq!(status.failed.len(), 1);
    assert_eq!(status.failed[0].package_hash, "broken");

    let _ = fs::remove_dir_all(root);
}
