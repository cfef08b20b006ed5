use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_redpacket-sync"))
        .arg(&path)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_feed() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty());

    let mut lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "packet,creator,total,remaining,claimed,shares,active");
    lines.remove(0);
    lines.sort();
    // the duplicate claim row in the fixture is suppressed: packet 1
    // still shows two claims
    assert_eq!(lines[0], "1,0xa11ce,1.0000,0.4000,2,4,true");
    assert_eq!(lines[1], "2,0xdan,0.5000,0.5000,0,2,true");
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized event kind"));
    assert!(stderr.contains("missing amount"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "packet,creator,total,remaining,claimed,shares,active");
    assert_eq!(lines[1], "1,0xa11ce,1.0000,0.7500,1,4,true");
}
