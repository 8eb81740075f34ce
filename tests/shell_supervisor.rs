#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use incbuild::engine::ActivityReporter;
use incbuild::exec::{CommandRequest, CommandRunner, ProcessSupervisor, ShellRunner};
use incbuild::shutdown::task_monitor;
use incbuild_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn request(command: &str) -> CommandRequest {
    CommandRequest {
        watch: "test".to_string(),
        command: command.to_string(),
        show_stdout: false,
    }
}

fn shell_runner(supervisor: &Arc<ProcessSupervisor>) -> ShellRunner {
    let (monitor, _failures) = task_monitor();
    ShellRunner::new(Arc::clone(supervisor), ActivityReporter::disabled(), monitor)
}

async fn wait_until_unregistered(supervisor: &ProcessSupervisor, pid: u32) {
    with_timeout(async {
        while supervisor.contains(pid) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn finished_commands_leave_the_registry() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out.txt");

    let supervisor = Arc::new(ProcessSupervisor::new());
    let mut runner = shell_runner(&supervisor);

    let pid = runner.execute(request(&format!("echo hello > '{}'", out.display())))?;
    wait_until_unregistered(&supervisor, pid).await;

    assert_eq!(std::fs::read_to_string(&out)?.trim(), "hello");
    assert!(supervisor.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_commands_are_unregistered_too() -> TestResult {
    init_tracing();
    let supervisor = Arc::new(ProcessSupervisor::new());
    let mut runner = shell_runner(&supervisor);

    let pid = runner.execute(request("exit 3"))?;
    wait_until_unregistered(&supervisor, pid).await;
    assert!(supervisor.is_empty());
    Ok(())
}

#[tokio::test]
async fn terminate_all_stops_long_running_commands() -> TestResult {
    init_tracing();
    let supervisor = Arc::new(ProcessSupervisor::new());
    let mut runner = shell_runner(&supervisor);

    let first = runner.execute(request("sleep 30"))?;
    let second = runner.execute(request("sleep 30"))?;
    assert_ne!(first, second);
    assert!(supervisor.contains(first));
    assert!(supervisor.contains(second));

    let terminated = with_timeout(supervisor.terminate_all()).await;
    assert_eq!(terminated, 2);
    assert!(supervisor.is_empty());

    assert_eq!(with_timeout(supervisor.terminate_all()).await, 0);
    Ok(())
}

#[tokio::test]
async fn terminate_all_lets_children_run_their_term_handlers() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("cleaned-up");
    let ready = dir.path().join("trap-installed");

    let supervisor = Arc::new(ProcessSupervisor::new());
    let mut runner = shell_runner(&supervisor);

    let script = format!(
        "trap 'echo done > \"{marker}\"; exit 0' TERM; touch \"{ready}\"; \
         while true; do sleep 0.05; done",
        marker = marker.display(),
        ready = ready.display(),
    );
    runner.execute(request(&script))?;

    with_timeout(async {
        while !ready.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let terminated = with_timeout(supervisor.terminate_all()).await;
    assert_eq!(terminated, 1);
    assert_eq!(std::fs::read_to_string(&marker)?.trim(), "done");
    Ok(())
}
