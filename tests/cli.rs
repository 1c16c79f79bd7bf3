// End-to-end checks of the hostgate binary's exit behaviour
use std::{
    process::{Command, Stdio},
    time::{Duration, Instant},
};

fn hostgate() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hostgate"));
    command.env("RUST_LOG", "error");
    command
}

#[test]
fn test_malformed_routes_file_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let output = hostgate()
        .args(["--port", "0", "--host", "127.0.0.1", "--config"])
        .arg(&path)
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_check_reports_routes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    std::fs::write(
        &path,
        r#"{"routes": {"a.test": "http://127.0.0.1:9001", "bad.test": "nope"}}"#,
    )
    .unwrap();

    let output = hostgate().arg("check").arg("--config").arg(&path).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Valid routes: 1"), "{stdout}");
    assert!(stdout.contains("a.test -> http://127.0.0.1:9001/"), "{stdout}");
    assert!(stdout.contains("Skipped routes: 1"), "{stdout}");
}

#[test]
fn test_check_fails_on_malformed_or_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let malformed = dir.path().join("routes.json");
    std::fs::write(&malformed, r#"{"routes": ["a.test"]}"#).unwrap();

    let output = hostgate().arg("check").arg("--config").arg(&malformed).output().unwrap();
    assert!(!output.status.success());

    let missing = dir.path().join("absent.json");
    let output = hostgate().arg("check").arg("--config").arg(&missing).output().unwrap();
    assert!(!output.status.success());
}

#[cfg(unix)]
#[test]
fn test_malformed_routes_on_hangup_exits_non_zero() {
    use std::io::{BufRead, BufReader};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    std::fs::write(&path, r#"{"routes": {"a.test": "http://127.0.0.1:9001"}}"#).unwrap();

    let mut child = hostgate()
        .env("RUST_LOG", "info")
        .args(["--port", "0", "--host", "127.0.0.1", "--config"])
        .arg(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // The listening line is logged after the SIGHUP handler has been spawned
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let started = lines
        .by_ref()
        .map_while(Result::ok)
        .any(|line| line.contains("hostgate listening on"));
    assert!(started, "hostgate exited before listening");
    std::thread::spawn(move || lines.for_each(drop));
    std::thread::sleep(Duration::from_millis(200));

    std::fs::write(&path, "{ this is not json").unwrap();
    let hup = Command::new("kill")
        .args(["-HUP", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(hup.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("hostgate kept running after a malformed reload");
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    // Exited through the error path, not killed by the signal
    assert_eq!(status.code(), Some(1));
}
