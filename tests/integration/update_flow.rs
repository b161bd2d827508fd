//! Update scenarios run through the orchestrator with fake collaborators.
//!
//! Archives are real zip files extracted by the real extractor, so the
//! installation directory ends up in the same state a production run would
//! leave it in.

use auto_updater::core::UpdaterError;
use auto_updater::test_utils::{
    FakeFullSource, FakePatchApplier, FakeReleaseStore, PackageFixture, RecordingProcessControl,
    TEST_EXE_NAME, TEST_MAIN_PID, TestEnvironment, fake_collaborators,
};
use auto_updater::upgrade::{
    UpdateContext, UpdateOrchestrator, UpdateReport, UpdateState, UpdateStrategy,
};

struct Scenario {
    env: TestEnvironment,
    store: FakeReleaseStore,
    fallback: FakeFullSource,
    patcher: FakePatchApplier,
    process: RecordingProcessControl,
}

impl Scenario {
    fn new(store: FakeReleaseStore) -> Self {
        Self {
            env: TestEnvironment::new().unwrap(),
            store,
            fallback: FakeFullSource::failing(),
            patcher: FakePatchApplier::succeeding(),
            process: RecordingProcessControl::default(),
        }
    }

    fn full_release(&self, root_dir: &str, archive_name: &str) -> std::path::PathBuf {
        PackageFixture::full_release(root_dir, TEST_EXE_NAME, "1.0.1")
            .write_zip(&self.env.staging_dir, archive_name)
            .unwrap()
    }

    fn patch_set(&self, versions: &[&str]) -> std::path::PathBuf {
        PackageFixture::patch_set("patches-1.0.1", versions)
            .write_zip(&self.env.staging_dir, "patches-1.0.1.zip")
            .unwrap()
    }

    fn orchestrator(&self) -> UpdateOrchestrator {
        UpdateOrchestrator::new(UpdateContext::new(
            self.env.settings(),
            fake_collaborators(&self.store, &self.fallback, &self.patcher, &self.process),
        ))
    }
}

/// Scenario A: the installed version is current.
#[tokio::test]
async fn test_up_to_date_installation_is_left_alone() {
    let scenario = Scenario::new(FakeReleaseStore::new("1.0.0"));
    let mut orchestrator = scenario.orchestrator();

    let report = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert_eq!(
        report,
        UpdateReport::UpToDate {
            current: "1.0.0".to_string(),
            latest: "1.0.0".to_string(),
        }
    );
    assert_eq!(orchestrator.history(), &[UpdateState::Checking, UpdateState::NoUpdate]);
    assert_eq!(scenario.store.full_downloads.get(), 0);
    assert_eq!(scenario.store.patch_downloads.get(), 0);
    assert_eq!(scenario.fallback.downloads.get(), 0);
    assert!(scenario.process.terminated().is_empty());
    assert!(scenario.process.launched().is_empty());
    assert!(!scenario.env.workspace_dir().exists());
}

/// Scenario B: the patch set covers the installed version and applies cleanly.
#[tokio::test]
async fn test_incremental_update_patches_and_relaunches() {
    let mut scenario = Scenario::new(
        FakeReleaseStore::new("1.0.1").with_patch_range("0.9.0", "1.0.0"),
    );
    let patches = scenario.patch_set(&["0.9.0", "1.0.0"]);
    scenario.store = scenario.store.clone().with_patch_archive(patches);
    let mut orchestrator = scenario.orchestrator();

    let report = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert_eq!(
        report,
        UpdateReport::Updated {
            from: "1.0.0".to_string(),
            to: "1.0.1".to_string(),
            strategy: UpdateStrategy::Incremental,
            relaunched: true,
        }
    );
    assert_eq!(
        orchestrator.history(),
        &[
            UpdateState::Checking,
            UpdateState::Updating,
            UpdateState::IncrementalAttempt,
            UpdateState::DoneRestart,
        ]
    );
    assert_eq!(scenario.process.terminated(), vec![TEST_MAIN_PID]);
    assert_eq!(scenario.store.full_downloads.get(), 0);
    assert_eq!(scenario.fallback.downloads.get(), 0);
    assert_eq!(scenario.env.read_installed("PATCHED").as_deref(), Some("patch from 1.0.0"));
    assert_eq!(scenario.process.launched(), vec![scenario.env.install_path(TEST_EXE_NAME)]);
    assert!(!scenario.env.workspace_dir().exists());
}

/// Scenario C: the patch fails to apply, so the full release is copied over.
#[tokio::test]
async fn test_failed_patch_falls_back_to_full_update() {
    let mut scenario = Scenario::new(
        FakeReleaseStore::new("1.0.1").with_patch_range("1.0.0", "1.0.0"),
    );
    let patches = scenario.patch_set(&["1.0.0"]);
    let release = scenario.full_release("helper-1.0.1", "helper-1.0.1.zip");
    scenario.store = scenario.store.clone().with_patch_archive(patches).with_full_archive(release);
    scenario.patcher = FakePatchApplier::failing(1);
    let mut orchestrator = scenario.orchestrator();

    let report = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert!(matches!(
        report,
        UpdateReport::Updated {
            strategy: UpdateStrategy::Full,
            relaunched: true,
            ..
        }
    ));
    assert_eq!(
        orchestrator.history(),
        &[
            UpdateState::Checking,
            UpdateState::Updating,
            UpdateState::IncrementalAttempt,
            UpdateState::FullAttempt,
            UpdateState::DoneRestart,
        ]
    );
    // The incremental attempt already stopped the application
    assert_eq!(scenario.process.terminated(), vec![TEST_MAIN_PID]);
    assert_eq!(scenario.patcher.calls().len(), 1);

    let env = &scenario.env;
    assert_eq!(env.read_installed(TEST_EXE_NAME).as_deref(), Some("main binary 1.0.1"));
    assert_eq!(env.read_installed("utils/helper.dll").as_deref(), Some("helper 1.0.1"));
    assert_eq!(env.read_installed("config.toml").as_deref(), Some("# user settings"));
    assert!(env.read_installed(auto_updater::utils::executable_name("utils/auto_updater")).is_none());
    assert_eq!(scenario.process.launched(), vec![env.install_path(TEST_EXE_NAME)]);
    assert!(!env.workspace_dir().exists());
}

/// Scenario D: neither the store nor the fallback can deliver a full release.
#[tokio::test]
async fn test_full_update_without_any_source_is_fatal() {
    let scenario = Scenario::new(FakeReleaseStore::new("1.0.1"));
    let mut orchestrator = scenario.orchestrator();

    let err = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::AllSourcesFailed { .. })
    ));
    assert_eq!(orchestrator.state(), Some(UpdateState::Failed));
    assert_eq!(scenario.store.full_downloads.get(), 1);
    assert_eq!(scenario.fallback.downloads.get(), 1);
    assert!(scenario.process.launched().is_empty());
    assert!(!scenario.env.workspace_dir().exists());
    assert_eq!(
        scenario.env.read_installed(TEST_EXE_NAME).as_deref(),
        Some("main binary 1.0.0")
    );
}

#[tokio::test]
async fn test_fallback_release_with_unrelated_archive_name() {
    let mut scenario = Scenario::new(FakeReleaseStore::new("1.0.1"));
    let release = scenario.full_release("helper_v1.0.1", "latest.zip");
    scenario.fallback = FakeFullSource::serving(release);
    let mut orchestrator = scenario.orchestrator();

    orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert_eq!(
        scenario.env.read_installed(TEST_EXE_NAME).as_deref(),
        Some("main binary 1.0.1")
    );
    assert_eq!(scenario.process.terminated(), vec![TEST_MAIN_PID]);
}

#[tokio::test]
async fn test_leftover_workspace_is_cleared_before_update() {
    let mut scenario = Scenario::new(
        FakeReleaseStore::new("1.0.1").with_patch_range("1.0.0", "1.0.0"),
    );
    let patches = scenario.patch_set(&["1.0.0"]);
    scenario.store = scenario.store.clone().with_patch_archive(patches);

    // An interrupted earlier run left an extra directory behind, which would
    // otherwise make package root resolution ambiguous
    let stale = scenario.env.workspace_dir().join("stale-package");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("junk.bin"), "junk").unwrap();

    let mut orchestrator = scenario.orchestrator();
    let report = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert!(matches!(
        report,
        UpdateReport::Updated {
            strategy: UpdateStrategy::Incremental,
            ..
        }
    ));
    assert!(!scenario.env.workspace_dir().exists());
}

#[tokio::test]
async fn test_dry_run_downloads_but_changes_nothing() {
    let mut scenario = Scenario::new(FakeReleaseStore::new("1.0.1"));
    let release = scenario.full_release("helper-1.0.1", "helper-1.0.1.zip");
    scenario.store = scenario.store.clone().with_full_archive(release);
    let mut orchestrator = UpdateOrchestrator::new(UpdateContext::new(
        scenario.env.settings().with_dry_run(true),
        fake_collaborators(&scenario.store, &scenario.fallback, &scenario.patcher, &scenario.process),
    ));

    let report = orchestrator.run(&scenario.env.request("1.0.0")).await.unwrap();

    assert!(matches!(
        report,
        UpdateReport::Updated {
            relaunched: false,
            ..
        }
    ));
    assert_eq!(scenario.store.full_downloads.get(), 1);
    assert!(scenario.process.terminated().is_empty());
    assert!(scenario.process.launched().is_empty());
    assert_eq!(
        scenario.env.read_installed(TEST_EXE_NAME).as_deref(),
        Some("main binary 1.0.0")
    );
}
