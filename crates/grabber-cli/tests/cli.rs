use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn grabber(config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("grabber").unwrap();
    // Keep the user's real configuration out of the way
    cmd.arg("--config")
        .arg(config_dir.path().join("config.json"));
    cmd
}

fn write_config(dir: &tempfile::TempDir) {
    fs::write(dir.path().join("config.json"), "{}").unwrap();
}

#[test]
fn test_extract_plain_text_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let input = dir.path().join("notes.txt");
    fs::write(&input, "hello from a text file").unwrap();

    grabber(&dir)
        .arg("extract")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from a text file"));
}

#[test]
fn test_extract_csv_to_file() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let input = dir.path().join("people.csv");
    fs::write(&input, "name,role\nAda,engineer\n").unwrap();
    let output = dir.path().join("out.txt");

    grabber(&dir)
        .arg("extract")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "{\"name\":\"Ada\",\"role\":\"engineer\"}"
    );
}

#[test]
fn test_extract_with_content_type_override() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let input = dir.path().join("export.dat");
    fs::write(&input, "k\nv\n").unwrap();

    grabber(&dir)
        .arg("extract")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported content type"));

    grabber(&dir)
        .args(["extract", "--content-type", "text/csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("{\"k\":\"v\"}"));
}

#[test]
fn test_extract_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);

    grabber(&dir)
        .arg("extract")
        .arg(dir.path().join("nope.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to fetch file"));
}

#[test]
fn test_extract_rejects_invalid_scale() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let input = dir.path().join("notes.txt");
    fs::write(&input, "text").unwrap();

    grabber(&dir)
        .args(["extract", "--scale", "0"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("scale must be a positive number"));
}

#[test]
fn test_batch_writes_outputs_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let inputs = dir.path().join("in");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("a.txt"), "first").unwrap();
    fs::write(inputs.join("b.txt"), "second").unwrap();
    let out = dir.path().join("out");

    grabber(&dir)
        .arg("batch")
        .arg(inputs.join("*.txt"))
        .arg("--output-dir")
        .arg(&out)
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful"));

    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(out.join("b.txt")).unwrap(), "second");

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("location,status,chars,processing_time_ms,error"));
    assert_eq!(summary.matches(",success,").count(), 2);
}

#[test]
fn test_batch_stops_on_error_unless_asked_to_continue() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    let good = dir.path().join("good.txt");
    fs::write(&good, "fine").unwrap();
    let bad = dir.path().join("missing.txt");

    grabber(&dir)
        .arg("batch")
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure();

    grabber(&dir)
        .arg("batch")
        .arg(&good)
        .arg(&bad)
        .arg("--continue-on-error")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful, 1 failed"));
}

#[test]
fn test_config_init_get_set() {
    let dir = tempfile::tempdir().unwrap();

    grabber(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    grabber(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Use --force to overwrite"));

    grabber(&dir)
        .args(["config", "set", "pdf.min_text_length", "10"])
        .assert()
        .success();

    grabber(&dir)
        .args(["config", "get", "pdf.min_text_length"])
        .assert()
        .success()
        .stdout(predicate::str::diff("10\n"));

    grabber(&dir)
        .args(["config", "set", "pdf.scale", "-1"])
        .assert()
        .failure();
}

#[test]
fn test_batch_keeps_outputs_with_same_stem() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir);
    for sub in ["a", "b"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
        fs::write(dir.path().join(sub).join("report.txt"), sub).unwrap();
    }
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    grabber(&dir)
        .arg("batch")
        .arg(dir.path().join("a/report.txt"))
        .arg(dir.path().join("b/report.txt"))
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success();

    // Jobs finish in any order, so either input may take the suffix
    let mut contents = vec![
        fs::read_to_string(out.join("report.txt")).unwrap(),
        fs::read_to_string(out.join("report-2.txt")).unwrap(),
    ];
    contents.sort();
    assert_eq!(contents, vec!["a", "b"]);
}
