//! Tests for the `auto_updater` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auto_updater::test_utils::{PackageFixture, TEST_EXE_NAME, TestEnvironment};

fn updater() -> Command {
    let mut cmd = Command::cargo_bin("auto_updater").unwrap();
    cmd.env_remove("AUTO_UPDATER_CONFIG").env_remove("RUST_LOG").env("AUTO_UPDATER_NO_PROGRESS", "1");
    cmd
}

#[test]
fn test_direct_launch_explains_and_exits_cleanly() {
    updater()
        .arg("--no-pause")
        .assert()
        .success()
        .stdout(predicate::str::contains("started without an installation directory"));
}

#[test]
fn test_missing_install_dir_fails() {
    let temp = TempDir::new().unwrap();
    updater()
        .args(["--no-pause", "--cwd"])
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not launched by the main application"));
}

#[test]
fn test_explicit_config_must_exist() {
    let env = TestEnvironment::new().unwrap();
    updater()
        .args(["--no-pause", "--config"])
        .arg(env.temp_dir.path().join("nope.toml"))
        .arg("--cwd")
        .arg(&env.install_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_against_release_manifest() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    let patches = PackageFixture::patch_set("patches-1.0.1", &["1.0.0"])
        .write_zip(&env.staging_dir, "patches-1.0.1.zip")
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "1.0.1",
            "full": { "url": "helper-1.0.1.zip" },
            "patches": { "min_version": "1.0.0", "max_version": "1.0.0", "url": "patches-1.0.1.zip" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patches-1.0.1.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(std::fs::read(&patches).unwrap()))
        .mount(&server)
        .await;

    let config = env.temp_dir.path().join("updater.toml");
    std::fs::write(
        &config,
        format!("[source]\nmanifest_url = \"{}/latest.json\"\nretries = 0\n", server.uri()),
    )
    .unwrap();

    let install_dir = env.install_dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        updater()
            .args(["--no-pause", "--dry-run", "--pid", "0", "--version", "1.0.0"])
            .args(["--exe_name", TEST_EXE_NAME])
            .arg("--cwd")
            .arg(&install_dir)
            .arg("--config")
            .arg(&config)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("incremental update"));
    assert!(stdout.contains("not restarted"));
    assert_eq!(env.read_installed(TEST_EXE_NAME).as_deref(), Some("main binary 1.0.0"));
    assert!(env.read_installed("PATCHED").is_none());
    assert!(env.install_path("logs/auto_updater.log").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_without_release_manifest_uses_github_version() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/repos/fzls/djc_helper/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "tag_name": "v1.0.0", "assets": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Only the API base is overridden; there is no [source] section
    std::fs::write(
        env.install_path("updater.toml"),
        format!("[github]\napi_base = \"{}\"\n", server.uri()),
    )
    .unwrap();

    let install_dir = env.install_dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        updater()
            .args(["--no-pause", "--pid", "0", "--version", "1.0.0"])
            .args(["--exe_name", TEST_EXE_NAME])
            .arg("--cwd")
            .arg(&install_dir)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("is up to date"));
}
