use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn fragmenter_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fragmenter"))
}

fn write_config(dir: &Path, strategy: &str) -> PathBuf {
    let out = dir.join("out");
    let config = format!(
        r#"{{
            "input": ["{input}"],
            "output": {{
                "streams": 2,
                "file_extension": ".nq",
                "routes": [{{"pattern": "^http://pod.example/(.*)$", "replacement": "{out}/$1"}}]
            }},
            "strategy": {strategy}
        }}"#,
        input = dir.join("data.nq").display(),
        out = out.display(),
        strategy = strategy,
    );
    let path = dir.join("config.json");
    fs::write(&path, config).expect("write config");
    path
}

fn write_data(dir: &Path) {
    let data = "\
<http://pod.example/alice/profile> <http://xmlns.com/foaf/0.1/knows> <http://pod.example/bob/profile> .
<http://pod.example/alice/profile> <http://xmlns.com/foaf/0.1/name> \"Alice\" .
<http://pod.example/bob/profile> <http://xmlns.com/foaf/0.1/address> _:addr .
_:addr <http://pod.example/vocab#city> \"Ghent\" .
<http://pod.example/alice/posts/1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://pod.example/vocab#Post> .
";
    fs::write(dir.join("data.nq"), data).expect("write data");
}

#[test]
fn fragments_by_subject() {
    let dir = tempfile::tempdir().unwrap();
    write_data(dir.path());
    let config = write_config(dir.path(), r#"{"type": "subject"}"#);

    let out = Command::new(fragmenter_bin())
        .arg(&config)
        .output()
        .expect("run fragmenter");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let alice = fs::read_to_string(dir.path().join("out/alice/profile.nq")).unwrap();
    assert_eq!(alice.lines().count(), 2);
    let bob = fs::read_to_string(dir.path().join("out/bob/profile.nq")).unwrap();
    // the address blank node follows its owner
    assert_eq!(bob.lines().count(), 2);
    assert!(bob.contains("Ghent"));
    assert!(dir.path().join("out/alice/posts/1.nq").exists());
}

#[test]
fn repeated_runs_append() {
    let dir = tempfile::tempdir().unwrap();
    write_data(dir.path());
    let config = write_config(dir.path(), r#"{"type": "subject", "blank_nodes": false}"#);

    for _ in 0..2 {
        let status = Command::new(fragmenter_bin())
            .arg(&config)
            .status()
            .expect("run fragmenter");
        assert!(status.success());
    }
    let bob = fs::read_to_string(dir.path().join("out/bob/profile.nq")).unwrap();
    assert_eq!(bob.lines().count(), 2);
}

#[test]
fn unresolved_resources_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_data(dir.path());
    let config = write_config(
        dir.path(),
        r#"{"type": "resource_object", "type_pattern": "vocab#Post$", "target_predicate": "vocab#hasCreator$"}"#,
    );

    let out = Command::new(fragmenter_bin())
        .arg(&config)
        .output()
        .expect("run fragmenter");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("Detected non-identified resources: http://pod.example/alice/posts/1"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn print_config_does_not_fragment() {
    let dir = tempfile::tempdir().unwrap();
    write_data(dir.path());
    let config = write_config(dir.path(), r#"{"type": "object"}"#);

    let out = Command::new(fragmenter_bin())
        .arg(&config)
        .arg("--print-config")
        .output()
        .expect("run fragmenter");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Strategy: object"));
    assert!(stdout.contains("Streams: 2"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(fragmenter_bin())
        .arg(dir.path().join("nope.json"))
        .output()
        .expect("run fragmenter");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to open config file"));
}

#[test]
fn unroutable_targets_fail() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("data.nq"),
        "<http://elsewhere.example/x> <http://ex.org/p> <http://ex.org/o> .\n",
    )
    .unwrap();
    let config = write_config(dir.path(), r#"{"type": "subject"}"#);

    let out = Command::new(fragmenter_bin())
        .arg(&config)
        .output()
        .expect("run fragmenter");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr)
        .contains("No routing rule matches target http://elsewhere.example/x"));
}
