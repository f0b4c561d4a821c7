use assert_cmd::prelude::*;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const WIDE: &str = "\
id,a,b,c
1,10,11,12
2,20,21,22
";

const METADATA: &str = "\
key,group
a,group1
b,group1
c,group2
";

fn write_inputs(dir: &TempDir, metadata: &str) -> (PathBuf, PathBuf) {
    let wide = dir.path().join("wide.csv");
    let meta = dir.path().join("metadata.csv");
    std::fs::write(&wide, WIDE).expect("write wide.csv");
    std::fs::write(&meta, metadata).expect("write metadata.csv");
    (wide, meta)
}

fn widelong(wide: &Path, meta: &Path, subcommand: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("widelong"));
    cmd.arg(subcommand)
        .arg("--wide")
        .arg(wide)
        .arg("--metadata")
        .arg(meta)
        .arg("--id")
        .arg("id");
    cmd
}

#[test]
fn run_writes_joined_long_csv() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);
    let out = dir.path().join("long.csv");

    widelong(&wide, &meta, "run")
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        text,
        "\
id,key,value,group
1,a,10,group1
1,b,11,group1
1,c,12,group2
2,a,20,group1
2,b,21,group1
2,c,22,group2
"
    );
}

#[test]
fn run_sorts_by_categorical_order() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);

    let assert = widelong(&wide, &meta, "run")
        .arg("--order")
        .arg("group=group2,group1")
        .arg("--sort")
        .arg("group")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[1], "1,c,12,group2");
    assert_eq!(lines[2], "2,c,22,group2");
    assert_eq!(lines[3], "1,a,10,group1");
}

#[test]
fn run_json_reports_dropped_keys() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, "key,group\na,group1\nb,group1\n");

    let assert = widelong(&wide, &meta, "run")
        .arg("--format")
        .arg("json")
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["rows"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["coverage"]["missing"], serde_json::json!(["c"]));
    assert_eq!(json["warnings"][0]["key"], serde_json::json!("c"));
    assert_eq!(json["warnings"][0]["dropped_rows"], serde_json::json!(2));
}

#[test]
fn numeric_headers_match_metadata_keys() {
    let dir = TempDir::new().unwrap();
    let wide = dir.path().join("wide.csv");
    let meta = dir.path().join("metadata.csv");
    std::fs::write(&wide, "country,2020,2021\nfr,1.5,1.7\nde,2.0,2.2\n").unwrap();
    std::fs::write(&meta, "key,era\n2020,pre\n2021,post\n").unwrap();

    let assert = Command::new(assert_cmd::cargo::cargo_bin!("widelong"))
        .arg("run")
        .arg("--wide")
        .arg(&wide)
        .arg("--metadata")
        .arg(&meta)
        .arg("--id")
        .arg("country")
        .arg("--order")
        .arg("key=2021,2020")
        .arg("--sort")
        .arg("key")
        .arg("--strict")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert_eq!(
        stdout,
        "\
country,key,value,era
fr,2021,1.7,post
de,2021,2.2,post
fr,2020,1.5,pre
de,2020,2,pre
"
    );

    Command::new(assert_cmd::cargo::cargo_bin!("widelong"))
        .arg("coverage")
        .arg("--wide")
        .arg(&wide)
        .arg("--metadata")
        .arg(&meta)
        .arg("--id")
        .arg("country")
        .assert()
        .success();
}

#[test]
fn strict_run_fails_on_missing_metadata() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, "key,group\na,group1\nb,group1\n");

    let assert = widelong(&wide, &meta, "run")
        .arg("--strict")
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("'c'"), "stderr:\n{stderr}");
}

#[test]
fn coverage_exits_nonzero_when_incomplete() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, "key,group\na,group1\nb,group1\ntypo,group2\n");

    let assert = widelong(&wide, &meta, "coverage").assert().code(1);
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains("missing: c"), "stdout:\n{stdout}");
    assert!(stdout.contains("unused: typo"), "stdout:\n{stdout}");
    assert!(stdout.contains("Result: INCOMPLETE"), "stdout:\n{stdout}");
}

#[test]
fn coverage_succeeds_when_complete() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);

    let assert = widelong(&wide, &meta, "coverage")
        .arg("--format")
        .arg("json")
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["complete"], serde_json::json!(true));
    assert_eq!(json["measure_columns"], serde_json::json!(3));
}

#[test]
fn crosstab_counts_key_by_group() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);

    let assert = widelong(&wide, &meta, "crosstab")
        .arg("--columns")
        .arg("group")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let rows: Vec<Vec<&str>> = stdout
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec!["a", "2", "0"],
            vec!["b", "2", "0"],
            vec!["c", "0", "2"]
        ]
    );
}

#[test]
fn unknown_id_column_is_reported() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);

    let assert = Command::new(assert_cmd::cargo::cargo_bin!("widelong"))
        .arg("run")
        .arg("--wide")
        .arg(&wide)
        .arg("--metadata")
        .arg(&meta)
        .arg("--id")
        .arg("subject")
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("subject"), "stderr:\n{stderr}");
}

#[test]
fn run_does_not_panic_on_broken_pipe() {
    let dir = TempDir::new().unwrap();
    let (wide, meta) = write_inputs(&dir, METADATA);

    // Simulate a downstream consumer exiting early (e.g. `widelong run ... | head`).
    let mut child = widelong(&wide, &meta, "run")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn widelong");
    drop(child.stdout.take());

    let output = child.wait_with_output().expect("wait for widelong");
    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
