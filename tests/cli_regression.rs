// End-to-end tests of the defcheck binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn defcheck() -> Command {
    let mut cmd = Command::cargo_bin("defcheck").unwrap();
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .arg("--color")
        .arg("never");
    cmd
}

fn nra_puppet(cmd: &mut Command) -> &mut Command {
    cmd.args(["puppet_nonroot", "nra.puppet"])
        .args(["-p", "user=bob"])
        .args(["-p", "puppet_master_fqdn=puppet.fake"])
        .args(["-p", "challenge_password=top_secret"])
}

#[test]
fn check_reports_compiled_declaration() {
    let mut cmd = defcheck();
    cmd.arg("check");
    nra_puppet(&mut cmd)
        .assert()
        .success()
        .stdout(contains("compiled Puppet_nonroot['nra.puppet']"));
}

#[test]
fn check_exits_one_when_a_required_parameter_is_missing() {
    defcheck()
        .args(["check", "puppet_nonroot", "nra.puppet", "-p", "user=bob"])
        .assert()
        .code(1)
        .stdout(
            contains("[missing_required_parameter]")
                .and(contains("$puppet_master_fqdn, $challenge_password")),
        );
}

#[test]
fn check_json_names_the_reason() {
    let mut cmd = defcheck();
    cmd.arg("check");
    nra_puppet(&mut cmd)
        .args(["-p", "master_port='8140'", "--json"])
        .assert()
        .code(1)
        .stdout(
            contains(r#""result": "failed""#).and(contains(r#""reason": "invalid_value_type""#)),
        );
}

#[test]
fn check_unknown_definition() {
    defcheck()
        .args(["check", "puppet_rootless", "x"])
        .assert()
        .code(1)
        .stdout(contains("[unknown_definition_name]"));
}

#[test]
fn show_prints_resolved_defaults() {
    let mut cmd = defcheck();
    cmd.arg("show");
    nra_puppet(&mut cmd).assert().success().stdout(
        contains("puppet_nonroot { 'nra.puppet':")
            .and(contains("master_port"))
            .and(contains("=> 8140,")),
    );
}

#[test]
fn show_renders_failures_as_diagnostics() {
    defcheck()
        .args(["show", "puppet_nonroot", "nra.puppet"])
        .assert()
        .code(1)
        .stderr(contains("defcheck::compile::missing_required_parameter"));
}

#[test]
fn list_json_includes_bundled_definition() {
    defcheck()
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""puppet_nonroot""#).and(contains(r#""type": "String[1]""#)));
}

#[test]
fn test_runs_bundled_suites() {
    defcheck()
        .args(["test", "spec"])
        .assert()
        .success()
        .stdout(contains("ok   with default values for all parameters").and(contains("0 failed")));
}

#[test]
fn params_file_and_extra_definitions_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("marker.pp");
    fs::write(&manifest, "define site::marker (String $message) { }\n").unwrap();
    let params = dir.path().join("params.yaml");
    fs::write(&params, "message: hello\n").unwrap();

    defcheck()
        .arg("--no-builtin")
        .arg("-d")
        .arg(&manifest)
        .args(["check", "site::marker", "m", "--params-file"])
        .arg(&params)
        .assert()
        .success()
        .stdout(contains("compiled Site::Marker['m']"));
}

#[test]
fn cli_reports_miette_diagnostics_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.pp");
    fs::write(&bad, "define broken (String $x { }").unwrap();

    defcheck()
        .arg("-d")
        .arg(&bad)
        .args(["list"])
        .assert()
        .code(2)
        .stderr(contains("defcheck::parse").or(contains("help:")));
}

#[test]
fn malformed_param_is_a_usage_error() {
    defcheck()
        .args(["check", "puppet_nonroot", "x", "-p", "user"])
        .assert()
        .code(2)
        .stderr(contains("defcheck::cli::argument"));
}

#[test]
fn param_values_keep_comment_characters() {
    defcheck()
        .args(["show", "puppet_nonroot", "nra.puppet"])
        .args(["-p", "user=bob", "-p", "puppet_master_fqdn=puppet.fake"])
        .args(["-p", "challenge_password=top #secret"])
        .assert()
        .success()
        .stdout(contains("=> 'top #secret',"));
}
