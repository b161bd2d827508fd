//! The update flow against the real HTTP release store and GitHub fallback,
//! served by a mock server.

use auto_updater::archive::ArchiveExtractor;
use auto_updater::config::GithubConfig;
use auto_updater::core::UpdaterError;
use auto_updater::source::{Downloader, GithubReleaseSource, HttpReleaseStore, build_client};
use auto_updater::test_utils::{
    FakePatchApplier, PackageFixture, RecordingProcessControl, TEST_EXE_NAME, TEST_MAIN_PID,
    TestEnvironment,
};
use auto_updater::upgrade::{
    Collaborators, UpdateContext, UpdateOrchestrator, UpdateReport, UpdateState, UpdateStrategy,
};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader() -> Downloader {
    Downloader::new(build_client(Duration::from_secs(10), false).unwrap(), 0)
}

fn github_config(server: &MockServer) -> GithubConfig {
    GithubConfig {
        owner: "example".to_string(),
        repo: "helper".to_string(),
        api_base: server.uri(),
        asset_suffix: ".zip".to_string(),
        ..GithubConfig::default()
    }
}

fn context(
    env: &TestEnvironment,
    server: &MockServer,
    patcher: &FakePatchApplier,
    process: &RecordingProcessControl,
) -> UpdateContext {
    let collaborators = Collaborators {
        store: Box::new(HttpReleaseStore::new(
            format!("{}/releases/latest.json", server.uri()),
            downloader(),
        )),
        fallback: Box::new(GithubReleaseSource::new(github_config(server), downloader())),
        decompressor: Box::new(ArchiveExtractor::new()),
        patcher: Box::new(patcher.clone()),
        process: Box::new(process.clone()),
    };
    UpdateContext::new(env.settings(), collaborators)
}

async fn serve_file(server: &MockServer, route: &str, file: &std::path::Path) {
    let body = std::fs::read(file).unwrap();
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_incremental_update_from_release_manifest() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    let patches = PackageFixture::patch_set("patches-1.0.1", &["1.0.0"])
        .write_zip(&env.staging_dir, "patches-1.0.1.zip")
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/releases/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "1.0.1",
            "full": { "url": "helper-1.0.1.zip" },
            "patches": {
                "min_version": "0.9.0",
                "max_version": "1.0.0",
                "url": "patches-1.0.1.zip"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    serve_file(&server, "/releases/patches-1.0.1.zip", &patches).await;

    let patcher = FakePatchApplier::succeeding();
    let process = RecordingProcessControl::default();
    let mut orchestrator = UpdateOrchestrator::new(context(&env, &server, &patcher, &process));

    let report = orchestrator.run(&env.request("1.0.0")).await.unwrap();

    assert!(matches!(
        report,
        UpdateReport::Updated {
            strategy: UpdateStrategy::Incremental,
            ..
        }
    ));
    assert_eq!(env.read_installed("PATCHED").as_deref(), Some("patch from 1.0.0"));
    assert_eq!(process.terminated(), vec![TEST_MAIN_PID]);
    assert_eq!(process.launched(), vec![env.install_path(TEST_EXE_NAME)]);
}

#[tokio::test]
async fn test_full_update_from_github_when_release_download_fails() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    let release = PackageFixture::full_release("helper_v1.0.1", TEST_EXE_NAME, "1.0.1")
        .write_zip(&env.staging_dir, "helper.zip")
        .unwrap();

    // No patch set, and the full release listed in the manifest is gone
    Mock::given(method("GET"))
        .and(path("/releases/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "1.0.1",
            "full": { "url": "helper-1.0.1.zip" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases/helper-1.0.1.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/example/helper/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tag_name": "v1.0.1",
            "assets": [
                { "name": "checksums.txt", "browser_download_url": format!("{}/dl/checksums.txt", server.uri()) },
                { "name": "helper.zip", "browser_download_url": format!("{}/dl/helper.zip", server.uri()) }
            ]
        })))
        .mount(&server)
        .await;
    serve_file(&server, "/dl/helper.zip", &release).await;

    let patcher = FakePatchApplier::succeeding();
    let process = RecordingProcessControl::default();
    let mut orchestrator = UpdateOrchestrator::new(context(&env, &server, &patcher, &process));

    let report = orchestrator.run(&env.request("1.0.0")).await.unwrap();

    assert!(matches!(
        report,
        UpdateReport::Updated {
            strategy: UpdateStrategy::Full,
            ..
        }
    ));
    assert!(patcher.calls().is_empty());
    assert_eq!(env.read_installed(TEST_EXE_NAME).as_deref(), Some("main binary 1.0.1"));
    assert_eq!(env.read_installed("config.toml").as_deref(), Some("# user settings"));
    assert_eq!(process.terminated(), vec![TEST_MAIN_PID]);
}

#[tokio::test]
async fn test_latest_version_from_github_when_manifest_is_unreachable() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/releases/latest.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/example/helper/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "tag_name": "v1.0.0", "assets": [] })),
        )
        .mount(&server)
        .await;

    let patcher = FakePatchApplier::succeeding();
    let process = RecordingProcessControl::default();
    let mut orchestrator = UpdateOrchestrator::new(context(&env, &server, &patcher, &process));

    let report = orchestrator.run(&env.request("1.0.0")).await.unwrap();

    assert_eq!(
        report,
        UpdateReport::UpToDate {
            current: "1.0.0".to_string(),
            latest: "1.0.0".to_string(),
        }
    );
    assert!(process.terminated().is_empty());
}

#[tokio::test]
async fn test_unreachable_sources_stop_before_touching_anything() {
    let server = MockServer::start().await;
    let env = TestEnvironment::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/releases/latest.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/example/helper/releases/latest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let patcher = FakePatchApplier::succeeding();
    let process = RecordingProcessControl::default();
    let mut orchestrator = UpdateOrchestrator::new(context(&env, &server, &patcher, &process));

    let err = orchestrator.run(&env.request("1.0.0")).await.unwrap_err();

    match err.downcast_ref::<UpdaterError>() {
        Some(UpdaterError::NetworkError {
            reason,
            ..
        }) => assert!(reason.contains("503"), "unexpected reason: {reason}"),
        other => panic!("expected a network error, got {other:?}"),
    }
    assert_eq!(orchestrator.state(), Some(UpdateState::Failed));
    assert!(process.terminated().is_empty());
    assert!(process.launched().is_empty());
}
