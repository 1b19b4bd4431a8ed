//! Integration tests driving real watchers and subprocesses.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use wbs::process::{Builder, Runner};
use wbs::watcher::FileWatcher;
use wbs::{Config, Orchestrator, Phase};

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).map_or(0, |s| s.lines().count())
}

struct Project {
    _tmp: TempDir,
    src: PathBuf,
    build_log: PathBuf,
    serve_log: PathBuf,
}

impl Project {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let src = root.join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.c"), "int main(void) { return 0; }\n").unwrap();

        Self {
            build_log: root.join("build.log"),
            serve_log: root.join("serve.log"),
            src,
            _tmp: tmp,
        }
    }

    fn config(&self, restart_process: bool) -> Config {
        Config {
            watch_paths: vec![self.src.clone()],
            exclude: Vec::new(),
            build_command: format!("sh -c 'echo built >> {}'", self.build_log.display()),
            serve_command: format!(
                "sh -c 'echo started >> {}; exec sleep 30'",
                self.serve_log.display()
            ),
            restart_process,
            stop_grace_ms: 2000,
            ..Default::default()
        }
    }
}

fn touch_later(path: PathBuf, delay: Duration) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        fs::write(path, "int main(void) { return 1; }\n").unwrap();
    })
}

/// Startup builds once and starts the server once.
#[tokio::test]
async fn test_startup_builds_and_serves() {
    let project = Project::new();
    let config = project.config(false);

    let watcher = FileWatcher::new(&config).unwrap();
    let builder = Builder::new(&config).unwrap();
    let runner = Runner::new(&config).unwrap();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);

    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.phase(), Phase::Idle);
    assert!(orchestrator.runner().pid().is_some());
    assert_eq!(line_count(&project.build_log), 1);

    orchestrator.run_until(async {}).await.unwrap();
    assert!(orchestrator.runner().pid().is_none());
}

/// A write with restart enabled rebuilds and starts a fresh server.
#[tokio::test]
async fn test_write_restarts_server() {
    let project = Project::new();
    let config = project.config(true);

    let watcher = FileWatcher::new(&config).unwrap();
    let builder = Builder::new(&config).unwrap();
    let runner = Runner::new(&config).unwrap();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);
    orchestrator.start().await.unwrap();

    let writer = touch_later(project.src.join("main.c"), Duration::from_millis(200));
    orchestrator
        .run_until(tokio::time::sleep(Duration::from_millis(1500)))
        .await
        .unwrap();
    writer.join().unwrap();

    assert!(line_count(&project.build_log) >= 2);
    assert!(line_count(&project.serve_log) >= 2);
    assert!(orchestrator.runner().pid().is_none());
}

/// A write without restart rebuilds but leaves the server alone.
#[tokio::test]
async fn test_write_without_restart_keeps_server() {
    let project = Project::new();
    let config = project.config(false);

    let watcher = FileWatcher::new(&config).unwrap();
    let builder = Builder::new(&config).unwrap();
    let runner = Runner::new(&config).unwrap();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);
    orchestrator.start().await.unwrap();

    let writer = touch_later(project.src.join("main.c"), Duration::from_millis(200));
    orchestrator
        .run_until(tokio::time::sleep(Duration::from_millis(1500)))
        .await
        .unwrap();
    writer.join().unwrap();

    assert!(line_count(&project.build_log) >= 2);
    assert_eq!(line_count(&project.serve_log), 1);
}

/// Changes under an excluded directory never trigger a build.
#[tokio::test]
async fn test_excluded_changes_are_ignored() {
    let project = Project::new();
    let ignored = project.src.join("generated");
    fs::create_dir_all(&ignored).unwrap();

    let config = Config {
        exclude: vec!["generated".to_string()],
        ..project.config(false)
    };

    let watcher = FileWatcher::new(&config).unwrap();
    let builder = Builder::new(&config).unwrap();
    let runner = Runner::new(&config).unwrap();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);
    orchestrator.start().await.unwrap();

    let writer = touch_later(ignored.join("out.c"), Duration::from_millis(200));
    orchestrator
        .run_until(tokio::time::sleep(Duration::from_millis(1000)))
        .await
        .unwrap();
    writer.join().unwrap();

    assert_eq!(line_count(&project.build_log), 1);
}

/// A failing initial build is fatal and carries the build output.
#[tokio::test]
async fn test_failed_initial_build_is_reported() {
    let project = Project::new();
    let config = Config {
        build_command: "sh -c 'echo broken >&2; exit 1'".to_string(),
        ..project.config(false)
    };

    let watcher = FileWatcher::new(&config).unwrap();
    let builder = Builder::new(&config).unwrap();
    let runner = Runner::new(&config).unwrap();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);

    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, wbs::Error::Build(_)));
    assert!(err.to_string().contains("broken"));
    assert!(orchestrator.runner().pid().is_none());
}
