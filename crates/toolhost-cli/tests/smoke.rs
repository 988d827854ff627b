use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn toolhost() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_toolhost"));
    command.env_remove("RUST_LOG");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_patch(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("patch file write should succeed");
    path
}

#[test]
fn apply_from_file_creates_and_updates_files() {
    let temp = TempDir::new().expect("temp dir should create");
    let root = temp.path().join("work");
    std::fs::create_dir(&root).expect("root should create");
    std::fs::write(root.join("greet.py"), "def greet():\n    print(\"Hi\")\n")
        .expect("seed write should succeed");
    let patch = write_patch(
        temp.path(),
        "change.patch",
        "*** Begin Patch\n\
         *** Add File: hello.txt\n\
         +Hello world\n\
         *** Update File: greet.py\n\
         @@ def greet():\n\
         -    print(\"Hi\")\n\
         +    print(\"Hello, world!\")\n\
         *** End Patch\n",
    );

    let output = toolhost()
        .arg("apply")
        .arg("--root")
        .arg(&root)
        .arg("--patch-file")
        .arg(&patch)
        .output()
        .expect("command should run");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Applied patch:"));
    assert!(text.contains("A hello.txt"));
    assert!(text.contains("M greet.py"));
    assert_eq!(
        std::fs::read_to_string(root.join("hello.txt")).expect("hello should exist"),
        "Hello world\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("greet.py")).expect("greet should exist"),
        "def greet():\n    print(\"Hello, world!\")\n"
    );
}

#[test]
fn apply_reads_patch_from_stdin() {
    let temp = TempDir::new().expect("temp dir should create");

    let mut child = toolhost()
        .arg("apply")
        .arg("--root")
        .arg(temp.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("command should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"*** Begin Patch\n*** Add File: from_stdin.txt\n+piped\n*** End Patch\n")
        .expect("stdin write should succeed");
    let output = child.wait_with_output().expect("command should finish");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("from_stdin.txt")).expect("file should exist"),
        "piped\n"
    );
}

#[test]
fn apply_exits_two_and_reports_json_when_a_directive_fails() {
    let temp = TempDir::new().expect("temp dir should create");
    std::fs::write(temp.path().join("keep.txt"), "original\n").expect("seed write should succeed");

    let output = toolhost()
        .arg("apply")
        .arg("--root")
        .arg(temp.path())
        .arg("--json")
        .arg("--patch")
        .arg(
            "*** Begin Patch\n\
             *** Add File: new.txt\n\
             +fresh\n\
             *** Delete File: missing.txt\n\
             *** End Patch\n",
        )
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    let report: Value = serde_json::from_str(&stdout(&output)).expect("stdout should be json");
    assert_eq!(report["mode"], "per_directive");
    assert_eq!(report["success"], false);
    assert_eq!(report["outcomes"][0]["status"], "applied");
    assert_eq!(report["outcomes"][1]["status"], "failed");
    assert_eq!(report["outcomes"][1]["error"]["kind"], "not_found");
    assert!(temp.path().join("new.txt").exists());
}

#[test]
fn transactional_apply_writes_nothing_on_failure() {
    let temp = TempDir::new().expect("temp dir should create");

    let output = toolhost()
        .arg("apply")
        .arg("--root")
        .arg(temp.path())
        .arg("--transactional")
        .arg("--patch")
        .arg(
            "*** Begin Patch\n\
             *** Add File: new.txt\n\
             +fresh\n\
             *** Update File: missing.txt\n\
             @@\n\
             -a\n\
             +b\n\
             *** End Patch\n",
        )
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("Patch applied with errors (1 of 2 directives failed):"));
    assert!(!temp.path().join("new.txt").exists());
}

#[test]
fn apply_rejects_malformed_patch_with_exit_one() {
    let temp = TempDir::new().expect("temp dir should create");

    let output = toolhost()
        .arg("apply")
        .arg("--root")
        .arg(temp.path())
        .arg("--patch")
        .arg("*** Begin Patch\n*** Rename File: a.txt\n*** End Patch\n")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: invalid patch at line 2"));
    assert_eq!(
        std::fs::read_dir(temp.path())
            .expect("root should be readable")
            .count(),
        0
    );
}

#[test]
fn check_lists_directives_as_json() {
    let output = toolhost()
        .arg("check")
        .arg("--json")
        .arg("--patch")
        .arg(
            "*** Begin Patch\n\
             *** Update File: old.txt\n\
             *** Move to: new.txt\n\
             @@\n\
             -x\n\
             +y\n\
             *** Delete File: gone.txt\n\
             *** End Patch\n",
        )
        .output()
        .expect("command should run");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let listing: Value = serde_json::from_str(&stdout(&output)).expect("stdout should be json");
    let directives = listing["directives"]
        .as_array()
        .expect("directives should be an array");
    assert_eq!(directives.len(), 2);
    assert_eq!(directives[0]["action"], "move");
    assert_eq!(directives[0]["move_to"], "new.txt");
    assert_eq!(directives[0]["hunks"], 1);
    assert_eq!(directives[1]["action"], "delete");
}

#[test]
fn check_rejects_missing_end_marker() {
    let output = toolhost()
        .arg("check")
        .arg("--patch")
        .arg("*** Begin Patch\n*** Delete File: a.txt\n")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid patch"));
}

#[test]
fn search_without_backend_configuration_fails() {
    // Run from an empty directory so no stray .env file is picked up.
    let temp = TempDir::new().expect("temp dir should create");

    let output = toolhost()
        .current_dir(temp.path())
        .env_remove("BROWSER_BACKEND")
        .arg("search")
        .arg("--query")
        .arg("rust")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("BROWSER_BACKEND is not set"));
}

#[test]
fn search_reports_missing_backend_key() {
    let temp = TempDir::new().expect("temp dir should create");

    let output = toolhost()
        .current_dir(temp.path())
        .env("BROWSER_BACKEND", "exa")
        .env_remove("EXA_API_KEY")
        .arg("search")
        .arg("--query")
        .arg("rust")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("EXA_API_KEY must be set when BROWSER_BACKEND=exa"));
}

#[test]
fn usage_errors_exit_one_not_two() {
    let output = toolhost()
        .arg("apply")
        .arg("--patch")
        .arg("*** Begin Patch\n*** Delete File: a.txt\n*** End Patch\n")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--root"));
}

#[test]
fn help_describes_every_subcommand() {
    let output = toolhost()
        .arg("--help")
        .output()
        .expect("command should run");

    assert!(output.status.success());
    let text = stdout(&output);
    for line in [
        "apply   Parse a patch and apply it under a root directory",
        "check   Parse a patch and list its directives",
        "search  Run a web search through the configured backend",
        "fetch   Fetch a page and print its body",
    ] {
        assert!(text.contains(line), "missing '{line}' in:\n{text}");
    }
}
