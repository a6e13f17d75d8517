use assert_cmd::Command;
use predicates::prelude::*;

fn kpt_cmd(repositories_file: &camino::Utf8Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("CARGO_TARGET_DIR", "target");
    cmd.arg("--repositories-file").arg(repositories_file.as_str());
    cmd
}

#[test]
fn repo_list_of_fresh_file_is_empty() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn repo_add_then_list_shows_the_registered_repository() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "add", "blueprints", "--kind", "git", "--url", "https://example.com/blueprints.git"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered repository blueprints"));

    kpt_cmd(&repositories_file)
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blueprints").and(predicate::str::contains("Git")));
}

#[test]
fn repo_add_oci_without_registry_fails() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "add", "deploy", "--kind", "oci"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--registry and --repository are required"));
}

#[test]
fn repo_add_duplicate_name_fails() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "add", "blueprints", "--kind", "git", "--url", "https://example.com/blueprints.git"])
        .assert()
        .success();

    kpt_cmd(&repositories_file)
        .args(["repo", "add", "blueprints", "--kind", "git", "--url", "https://example.com/other.git"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));
}

#[test]
fn repo_remove_unregistered_name_fails() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "remove", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not registered"));
}

#[test]
fn repo_remove_deregisters_a_registered_repository() {
    let temp = tempfile::tempdir().unwrap();
    let repositories_file = camino::Utf8PathBuf::try_from(temp.path().join("repos.yaml")).unwrap();

    kpt_cmd(&repositories_file)
        .args(["repo", "add", "blueprints", "--kind", "git", "--url", "https://example.com/blueprints.git"])
        .assert()
        .success();

    kpt_cmd(&repositories_file)
        .args(["repo", "remove", "blueprints"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deregistered repository blueprints"));

    kpt_cmd(&repositories_file)
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn completions_for_bash_include_the_binary_name() {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("CARGO_TARGET_DIR", "target");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kpt"));
}
