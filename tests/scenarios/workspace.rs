//! Test: workspaces are provisioned per run, isolated and always released

use crate::helpers::*;
use matrixci::core::{config::PipelineConfig, AbortReason, RunStatus};
use matrixci::execution::SchedulingStrategy;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Descriptor plus source tree in a temp directory
fn project(descriptor: &str) -> (tempfile::TempDir, Arc<matrixci::core::Pipeline>) {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("src/setup.py"), "setup()");
    write(&dir.path().join("lib/lib.txt"), "lib");
    write(&dir.path().join("pipeline.yaml"), descriptor);

    let config = PipelineConfig::from_file(dir.path().join("pipeline.yaml")).unwrap();
    let pipeline = Arc::new(config.to_pipeline().unwrap());
    (dir, pipeline)
}

#[tokio::test]
async fn test_local_checkout_with_nested_module() {
    let (_dir, pipeline) = project(
        r#"
name: local
workspace:
  source: src
  modules:
    - path: vendor/lib
      source: lib
strategy:
  matrix:
    version: ["1", "2"]
steps:
  - name: checkout
    uses: checkout
  - name: files
    run: test -f setup.py && test -f vendor/lib/lib.txt
"#,
    );
    let (engine, root) = real_engine(SchedulingStrategy::Parallel);

    let result = engine.execute(pipeline, None).await.unwrap();

    assert!(result.succeeded(), "{:?}", result.failures());
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_runs_do_not_share_state() {
    let yaml = r#"
name: isolated
strategy:
  matrix:
    n: ["1", "2", "3"]
steps:
  - name: clean
    run: test -z "$(ls)"
  - name: mark
    run: touch "marker-${{ matrix.n }}"
  - name: only-mine
    run: test "$(ls)" = "marker-${{ matrix.n }}"
"#;
    let (engine, _root) = real_engine(SchedulingStrategy::Parallel);

    let result = engine.execute(pipeline_from_yaml(yaml), None).await.unwrap();

    assert!(result.succeeded(), "{:?}", result.failures());
}

#[tokio::test]
async fn test_workspace_path_is_exposed() {
    let yaml = r#"
name: paths
steps:
  - name: cwd
    run: test "$(pwd -P)" = "$(cd '${{ workspace.path }}' && pwd -P)" && test "$MATRIXCI_WORKSPACE" = "${{ workspace.path }}"
"#;
    let (engine, _root) = real_engine(SchedulingStrategy::Sequential);

    let result = engine.execute(pipeline_from_yaml(yaml), None).await.unwrap();

    assert!(result.succeeded(), "{:?}", result.failures());
}

#[tokio::test]
async fn test_missing_nested_module_aborts_runs() {
    let (_dir, pipeline) = project(
        r#"
name: broken
workspace:
  source: src
  modules:
    - path: vendor/missing
      source: does-not-exist
strategy:
  matrix:
    version: ["1", "2"]
steps:
  - name: build
    run: make
"#,
    );
    let action = ScriptedAction::new();
    let (engine, root) = scripted_engine(&action, SchedulingStrategy::Parallel);

    let result = engine.execute(pipeline, None).await.unwrap();

    assert!(!result.succeeded());
    for index in 0..2 {
        assert_run_aborted(&result, index);
        assert!(matches!(
            &result.outcome(index).unwrap().status,
            RunStatus::Aborted { reason: AbortReason::Provisioning(msg) } if msg.contains("does-not-exist")
        ));
    }
    assert!(action.calls().is_empty());
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_run_releases_workspace() {
    let action = ScriptedAction::new().fail_step("build", 1);
    let (engine, root) = scripted_engine(&action, SchedulingStrategy::Parallel);

    let result = engine
        .execute(
            pipeline_from_yaml("name: f\nsteps:\n  - name: build\n    run: make\n"),
            None,
        )
        .await
        .unwrap();

    assert_run_failed_at(&result, 0, "build");
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

fn git(dir: &Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .args(["-c", "user.name=matrixci", "-c", "user.email=matrixci@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&output.stderr));
}

/// A bare repository next to the descriptor resolves relative to it
#[tokio::test]
async fn test_local_bare_repository_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    write(&work.join("setup.py"), "setup()");
    git(&work, &["init", "--quiet"]);
    git(&work, &["add", "."]);
    git(&work, &["commit", "--quiet", "-m", "init"]);
    git(dir.path(), &["clone", "--quiet", "--bare", "work", "upstream.git"]);

    write(
        &dir.path().join("pipeline.yaml"),
        r#"
name: bare
workspace:
  source: upstream.git
strategy:
  matrix:
    version: ["1", "2"]
steps:
  - name: files
    run: test -f setup.py
"#,
    );
    let config = PipelineConfig::from_file(dir.path().join("pipeline.yaml")).unwrap();
    let (engine, root) = real_engine(SchedulingStrategy::Parallel);

    let result = engine
        .execute(Arc::new(config.to_pipeline().unwrap()), None)
        .await
        .unwrap();

    assert!(result.succeeded(), "{:?}", result.failures());
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}
