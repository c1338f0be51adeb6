//! Integration tests for the rtexp binary.
//!
//! These tests verify end-to-end behavior including:
//! - Source, casting and chart management
//! - Exposure computation and recording
//! - Reports over recorded exposures

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to a data directory, isolated from the user's config
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rtexp"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

/// Pull the id printed after `label` out of command output
fn extract_id(stdout: &[u8], label: &str) -> String {
    let text = String::from_utf8_lossy(stdout);
    text.lines()
        .find_map(|line| line.strip_prefix(label))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no '{}' in output:\n{}", label, text))
}

fn add_ir_source(data_dir: &Path) -> String {
    let output = cli(data_dir)
        .args(["source", "add", "--isotope", "Ir-192", "--a0", "3700"])
        .args(["--ref-date", "2024-01-01", "--serial", "IR-0042"])
        .output()
        .unwrap();
    assert!(output.status.success());
    extract_id(&output.stdout, "Source id:")
}

fn open_casting(data_dir: &Path, name: &str, customer: &str) -> String {
    let output = cli(data_dir)
        .args(["casting", "open", "--name", name, "--customer", customer])
        .args(["--date", "2024-02-13", "--rt-no", "RT-118"])
        .output()
        .unwrap();
    assert!(output.status.success());
    extract_id(&output.stdout, "Casting id:")
}

fn expose(data_dir: &Path, casting: &str, source: &str, thickness: &str) -> assert_cmd::assert::Assert {
    cli(data_dir)
        .args(["expose", "--casting", casting, "--source", source])
        .args(["--technique", "SW/SI", "--film", "D7"])
        .args(["--thickness", thickness, "--sfd", "600", "--films", "1"])
        .args(["--at", "2024-02-13T00:00:00Z"])
        .assert()
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Radiography exposure time calculator",
        ));
}

#[test]
fn test_decay_reference_scenario() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["decay", "--isotope", "Ir-192", "--a0", "3700"])
        .args(["--ref-date", "2024-01-01", "--at", "2024-02-13"])
        .assert()
        .success()
        .stdout(predicate::str::contains("43.00 days"))
        .stdout(predicate::str::contains("A_eff:     2471.0 MBq"));
}

#[test]
fn test_decay_rejects_unknown_isotope() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["decay", "--isotope", "Cs-137", "--a0", "3700"])
        .args(["--ref-date", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported isotope"));
}

#[test]
fn test_source_add_and_list() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let id = add_ir_source(data_dir);
    assert!(data_dir.join("registry.json").exists());

    cli(data_dir)
        .args(["source", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id))
        .stdout(predicate::str::contains("IR-0042"));
}

#[test]
fn test_source_rejects_zero_activity() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["source", "add", "--isotope", "Co-60", "--a0", "0"])
        .args(["--ref-date", "2024-01-01"])
        .assert()
        .failure();
}

#[test]
fn test_expose_dry_run_does_not_record() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);

    cli(data_dir)
        .args(["expose", "--source", &source, "--technique", "SW/SI", "--film", "D7"])
        .args(["--thickness", "20", "--sfd", "600", "--at", "2024-02-13"])
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("A_eff:       2471.0 MBq"))
        .stdout(predicate::str::contains("Per casting: 90.19 s"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!data_dir.join("wal/exposures.wal").exists());
}

#[test]
fn test_expose_records_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let casting = open_casting(data_dir, "Valve body", "Acme Foundry");

    expose(data_dir, &casting, &source, "20")
        .success()
        .stdout(predicate::str::contains("Exposure recorded"));

    let wal = fs::read_to_string(data_dir.join("wal/exposures.wal")).unwrap();
    assert_eq!(wal.lines().count(), 1);

    let record: serde_json::Value = serde_json::from_str(wal.lines().next().unwrap()).unwrap();
    assert_eq!(record["casting_id"], casting.as_str());
    assert_eq!(record["isotope"], "Ir-192");
    assert_eq!(record["total_exposure_s"], 0);
    assert_eq!(record["per_casting_s"], 90);
}

#[test]
fn test_expose_without_chart_row_exits_2() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let casting = open_casting(data_dir, "Thick flange", "Acme Foundry");

    // built-in chart only covers 1-50 mm
    expose(data_dir, &casting, &source, "80")
        .code(2)
        .stderr(predicate::str::contains("No applicable exposure chart entry"));

    assert!(!data_dir.join("wal/exposures.wal").exists());
}

#[test]
fn test_expose_on_completed_casting_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let casting = open_casting(data_dir, "Valve body", "Acme Foundry");

    cli(data_dir)
        .args(["casting", "close", &casting])
        .assert()
        .success();

    expose(data_dir, &casting, &source, "20").failure();

    cli(data_dir)
        .args(["casting", "reopen", &casting])
        .assert()
        .success();

    expose(data_dir, &casting, &source, "20").success();
}

#[test]
fn test_chart_import_and_use() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let casting = open_casting(data_dir, "Thick flange", "Acme Foundry");

    let chart_csv = data_dir.join("import.csv");
    fs::write(
        &chart_csv,
        "isotope,technique,film_speed,material,thickness_min_mm,thickness_max_mm,base_constant,alpha,remarks\n\
         Ir-192,SW/SI,D7,steel,1,50,120,0.8,\n\
         Ir-192,SW/SI,D7,steel,50,100,400,0.9,thick sections\n",
    )
    .unwrap();

    cli(data_dir)
        .args(["chart", "import"])
        .arg(&chart_csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 chart rows"))
        .stdout(predicate::str::contains("overlap"));

    cli(data_dir)
        .args(["chart", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("thick sections"));

    expose(data_dir, &casting, &source, "80").success();
}

#[test]
fn test_chart_import_rejects_invalid_rows() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let chart_csv = data_dir.join("bad.csv");
    fs::write(
        &chart_csv,
        "isotope,technique,film_speed,material,thickness_min_mm,thickness_max_mm,base_constant\n\
         Ir-192,SW/SI,D7,steel,60,10,-1\n",
    )
    .unwrap();

    cli(data_dir)
        .args(["chart", "import"])
        .arg(&chart_csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Chart validation errors"));

    assert!(!data_dir.join("chart.csv").exists());
}

#[test]
fn test_chart_check_default() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["chart", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chart OK (1 rows)"));
}

#[test]
fn test_report_filters_and_totals() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let acme = open_casting(data_dir, "Valve body", "Acme Foundry");
    let beta = open_casting(data_dir, "Pump housing", "Beta Castings");

    expose(data_dir, &acme, &source, "20").success();
    expose(data_dir, &acme, &source, "30").success();
    expose(data_dir, &beta, &source, "20").success();

    cli(data_dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("Totals: 3 lines"));

    cli(data_dir)
        .args(["report", "--customer", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Totals: 2 lines, 2 films"))
        .stdout(predicate::str::contains("per casting 3m 0s"))
        .stdout(predicate::str::contains("Pump housing").not());

    cli(data_dir)
        .args(["report", "--from", "2025-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No exposures match"));
}

#[test]
fn test_configured_overhead_applies() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);

    let config_dir = data_dir.join("config/rtexp");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[overhead]\nsetting_time_s = 10.0\nmovement_time_s = 5.0\n",
    )
    .unwrap();

    cli(data_dir)
        .args(["expose", "--source", &source, "--technique", "SW/SI", "--film", "D7"])
        .args(["--thickness", "20", "--sfd", "600", "--at", "2024-02-13"])
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Per casting: 15.19 s"));
}

fn add_chart_row(data_dir: &Path, min: &str, max: &str, k: &str) -> assert_cmd::assert::Assert {
    cli(data_dir)
        .args(["chart", "add", "--isotope", "Ir-192", "--technique", "SW/SI"])
        .args(["--film", "D7", "--material", "steel"])
        .arg(format!("--thickness-min={}", min))
        .arg(format!("--thickness-max={}", max))
        .arg(format!("--base-constant={}", k))
        .args(["--alpha", "0.9"])
        .assert()
}

#[test]
fn test_chart_add_and_remove_row() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);
    let casting = open_casting(data_dir, "Thick flange", "Acme Foundry");

    let output = add_chart_row(data_dir, "60", "100", "400")
        .success()
        .stdout(predicate::str::contains("Chart row added"))
        .get_output()
        .stdout
        .clone();
    let row_id = extract_id(&output, "Chart row id:");

    // The built-in row is kept alongside the new one
    cli(data_dir)
        .args(["chart", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(row_id.as_str()))
        .stdout(predicate::str::contains("Factory default"));

    expose(data_dir, &casting, &source, "80").success();

    cli(data_dir)
        .args(["chart", "remove", &row_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed chart row"));

    expose(data_dir, &casting, &source, "80").code(2);

    cli(data_dir)
        .args(["chart", "remove", &row_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Chart row not found"));
}

#[test]
fn test_chart_add_reports_overlap() {
    let temp_dir = setup_test_dir();
    add_chart_row(temp_dir.path(), "40", "80", "300")
        .success()
        .stdout(predicate::str::contains("overlap"));
}

#[test]
fn test_chart_add_rejects_invalid_row() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add_chart_row(data_dir, "60", "100", "-1")
        .failure()
        .stderr(predicate::str::contains("base constant -1 must be positive"));
    add_chart_row(data_dir, "100", "60", "400")
        .failure()
        .stderr(predicate::str::contains("thickness min 100 > max 60"));

    assert!(!data_dir.join("chart.csv").exists());
}

#[test]
fn test_non_canonical_isotope_tag_rejected() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["source", "add", "--isotope", "ir192", "--a0", "3700"])
        .args(["--ref-date", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported isotope"));
}

#[test]
fn test_source_remove() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);

    cli(data_dir)
        .args(["source", "remove", &source])
        .assert()
        .success()
        .stdout(predicate::str::contains("IR-0042"));

    cli(data_dir)
        .args(["source", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sources registered"));

    cli(data_dir)
        .args(["expose", "--source", &source, "--technique", "SW/SI", "--film", "D7"])
        .args(["--thickness", "20", "--sfd", "600", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source not found"));

    cli(data_dir)
        .args(["source", "remove", &source])
        .assert()
        .failure();
}

#[test]
fn test_malformed_config_only_breaks_commands_that_read_it() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let source = add_ir_source(data_dir);

    let config_dir = data_dir.join("config/rtexp");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[overhead\nsetting_time_s = ").unwrap();

    cli(data_dir)
        .args(["decay", "--isotope", "Ir-192", "--a0", "3700"])
        .args(["--ref-date", "2024-01-01", "--at", "2024-02-13"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A_eff:     2471.0 MBq"));

    cli(data_dir)
        .args(["source", "list"])
        .assert()
        .success();

    cli(data_dir)
        .args(["expose", "--source", &source, "--technique", "SW/SI", "--film", "D7"])
        .args(["--thickness", "20", "--sfd", "600", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TOML error"));
}
