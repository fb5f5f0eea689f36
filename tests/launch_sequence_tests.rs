//! Integration tests for the launch sequence.
//!
//! A shell script stands in for ydotoold and a fake `python` inside a
//! temporary venv stands in for the main program. Both record what they
//! observe so each test can check one property of a run:
//! - a run with no previous daemon succeeds
//! - the socket has mode 0660 and the caller's uid:gid while the program runs
//! - the daemon log holds its startup output
//! - the program gets exactly `--global --device /dev/input/event3`
//! - no daemon survives the run
//! - a leftover daemon is gone before a new one starts
//! - a leftover socket file is never mistaken for readiness

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use ydo_launcher::daemon::is_daemon_process;
use ydo_launcher::{launch, LaunchConfig, ReadyState, SocketOwner};

// ============================================================================
// Test Helpers
// ============================================================================

const FAKE_DAEMON: &str = r#"#!/bin/sh
sock="$2"
mode="$4"
echo "ydotoold: socket=$sock mode=$mode owner=$6"
: > "$sock"
chmod "$mode" "$sock"
trap 'rm -f "$sock"; exit 0' TERM INT
while true; do sleep 0.05; done
"#;

/// Like `FAKE_DAEMON`, but shutting down takes half a second.
const SLOW_EXIT_DAEMON: &str = r#"#!/bin/sh
sock="$2"
: > "$sock"
chmod "$4" "$sock"
trap 'sleep 0.5; rm -f "$sock"; exit 0' TERM INT
while true; do sleep 0.05; done
"#;

/// A daemon that starts but never creates its socket.
const SILENT_DAEMON: &str = r#"#!/bin/sh
echo "ydotoold: never binding"
trap 'exit 0' TERM INT
while true; do sleep 0.05; done
"#;

/// Records whether the daemon in `old_pid` is still alive when the program
/// starts, and whether the socket survives a little later.
const OVERLAP_PYTHON: &str = r#"#!/bin/sh
if kill -0 "$(cat old_pid)" 2>/dev/null; then echo OLD_ALIVE; else echo OLD_GONE; fi > seen.txt
sleep 0.8
if [ -e "$YDOTOOL_SOCKET" ]; then echo SOCK_PRESENT; else echo SOCK_MISSING; fi >> seen.txt
"#;

const FAKE_PYTHON: &str = r#"#!/bin/sh
printf '%s\n' "$@" > args.txt
echo "$VIRTUAL_ENV" > venv.txt
stat -c '%a %u:%g' "$YDOTOOL_SOCKET" > socket.txt 2>/dev/null || echo missing > socket.txt
exit "$(cat exit_code 2>/dev/null || echo 0)"
"#;

fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Lays out a project dir with a fake venv and a fake daemon.
struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config: LaunchConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let bin = root.join(".venv/bin");
        fs::create_dir_all(&bin).unwrap();
        write_executable(&bin.join("python"), FAKE_PYTHON);

        let daemon = root.join("ydotoold");
        write_executable(&daemon, FAKE_DAEMON);

        let config = LaunchConfig {
            daemon_binary: daemon.to_string_lossy().into_owned(),
            socket_path: root.join(".ydotool_socket"),
            log_path: root.join("ydotoold.log"),
            pid_path: root.join("ydotoold.pid"),
            project_dir: root.clone(),
            elevate: false,
            sweep_stale: false,
            ready_timeout_ms: 5000,
            stop_grace_ms: 2000,
            ..LaunchConfig::default()
        };

        Self {
            _dir: dir,
            root,
            config,
        }
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.root.join(name)).unwrap_or_default()
    }

    /// Starts a daemon outside the launcher, as a previous run would have.
    fn spawn_leftover_daemon(&self) -> Child {
        let socket = self.config.socket_path.to_string_lossy().into_owned();
        let child = Command::new(&self.config.daemon_binary)
            .args(["-p", socket.as_str(), "-P", "0660", "-o", "0:0"])
            .spawn()
            .unwrap();
        fs::write(&self.config.pid_path, child.id().to_string()).unwrap();
        child
    }
}

/// Waits for `child` to exit, returning false on timeout.
fn wait_exit(child: &mut Child, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn run_without_previous_daemon_succeeds() {
    let fx = Fixture::new();

    let report = launch(&fx.config).await;

    assert!(!report.cleared_previous);
    assert!(report.daemon_pid.is_some());
    assert!(report.socket_ready());
    assert!(report.main_started);
    assert_eq!(report.exit_code, Some(0));
    assert!(report.daemon_stopped);
    assert_eq!(report.process_exit_code(false), 0);
}

#[tokio::test]
async fn socket_has_mode_and_owner_while_program_runs() {
    let fx = Fixture::new();

    launch(&fx.config).await;

    let owner = SocketOwner::current();
    assert_eq!(fx.read("socket.txt").trim(), format!("660 {}", owner));
}

#[tokio::test]
async fn daemon_log_holds_startup_output() {
    let fx = Fixture::new();
    fs::write(&fx.config.log_path, "stale output from an older run\n").unwrap();

    launch(&fx.config).await;

    let log = fx.read("ydotoold.log");
    assert!(log.contains("ydotoold: socket="));
    assert!(log.contains("mode=0660"));
    assert!(log.contains(&format!("owner={}", SocketOwner::current())));
    assert!(!log.contains("stale output"));
}

#[tokio::test]
async fn main_program_gets_exact_arguments() {
    let fx = Fixture::new();

    launch(&fx.config).await;

    let args: Vec<String> = fx.read("args.txt").lines().map(str::to_string).collect();
    assert_eq!(args, ["main.py", "--global", "--device", "/dev/input/event3"]);
    assert_eq!(
        fx.read("venv.txt").trim(),
        fx.root.join(".venv").to_string_lossy()
    );
}

#[tokio::test]
async fn no_daemon_remains_after_run() {
    let fx = Fixture::new();

    let report = launch(&fx.config).await;
    let pid = report.daemon_pid.expect("daemon should have started");

    assert!(!is_daemon_process(pid, &fx.config.daemon_binary));
    assert!(!fx.config.pid_path.exists());
    assert!(!fx.config.socket_path.exists());
}

#[tokio::test]
async fn failing_main_program_still_tears_down() {
    let fx = Fixture::new();
    fs::write(fx.root.join("exit_code"), "4").unwrap();

    let report = launch(&fx.config).await;

    assert_eq!(report.exit_code, Some(4));
    assert!(report.daemon_stopped);
    assert_eq!(report.process_exit_code(false), 0);
    assert_eq!(report.process_exit_code(true), 4);
}

#[tokio::test]
async fn leftover_daemon_is_cleared_before_start() {
    let fx = Fixture::new();
    let mut leftover = fx.spawn_leftover_daemon();
    // Let the leftover install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = launch(&fx.config).await;

    assert!(report.cleared_previous);
    assert!(wait_exit(&mut leftover, Duration::from_secs(5)));
    assert_ne!(report.daemon_pid, Some(leftover.id()));
}

#[tokio::test]
async fn slow_leftover_daemon_is_gone_before_new_one_starts() {
    let fx = Fixture::new();
    write_executable(Path::new(&fx.config.daemon_binary), SLOW_EXIT_DAEMON);
    write_executable(&fx.root.join(".venv/bin/python"), OVERLAP_PYTHON);

    let mut leftover = fx.spawn_leftover_daemon();
    let old_pid = leftover.id();
    fs::write(fx.root.join("old_pid"), old_pid.to_string()).unwrap();
    // Reap the leftover as soon as it exits so `kill -0` sees it gone.
    let reaper = std::thread::spawn(move || leftover.wait());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = launch(&fx.config).await;

    assert!(report.cleared_previous);
    assert_ne!(report.daemon_pid, Some(old_pid));
    assert!(report.socket_ready());
    assert_eq!(fx.read("seen.txt"), "OLD_GONE\nSOCK_PRESENT\n");
    assert!(reaper.join().unwrap().is_ok());
}

#[tokio::test]
async fn leftover_socket_file_is_not_readiness() {
    let mut fx = Fixture::new();
    write_executable(Path::new(&fx.config.daemon_binary), SILENT_DAEMON);
    fs::write(&fx.config.socket_path, "left by a crashed daemon").unwrap();
    fx.config.ready_timeout_ms = 300;

    let report = launch(&fx.config).await;

    assert!(report.daemon_pid.is_some());
    assert_eq!(report.ready, Some(ReadyState::TimedOut));
    assert!(!report.socket_ready());
    assert_eq!(fx.read("socket.txt").trim(), "missing");
    assert!(report.daemon_stopped);
}

#[tokio::test]
async fn sequential_runs_never_overlap() {
    let fx = Fixture::new();

    let first = launch(&fx.config).await;
    let second = launch(&fx.config).await;

    let (a, b) = (first.daemon_pid.unwrap(), second.daemon_pid.unwrap());
    assert_ne!(a, b);
    assert!(!is_daemon_process(a, &fx.config.daemon_binary));
    assert!(!is_daemon_process(b, &fx.config.daemon_binary));
}

#[tokio::test]
async fn daemon_that_fails_to_start_does_not_block_program() {
    let fx = Fixture::new();
    write_executable(
        Path::new(&fx.config.daemon_binary),
        "#!/bin/sh\necho 'failed to bind socket' >&2\nexit 1\n",
    );

    let report = launch(&fx.config).await;

    assert!(!report.socket_ready());
    assert!(report.main_started);
    assert_eq!(fx.read("socket.txt").trim(), "missing");
    assert!(fx.read("ydotoold.log").contains("failed to bind socket"));
}
