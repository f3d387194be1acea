#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stderr.clone()).expect("utf8 stderr")
}

const EMP_TEMPLATE: &str = "<query>
    select ename from emp where 1 = 1
    <if>and sal &gt;= :min_sal</if>
    <if>and deptno in (<a sep=','>:depts</a>)</if>
</query>";

#[test]
fn prune_prints_sql_and_used_parameters() {
    let dir = TempDir::new().expect("tempdir");
    let template = write(dir.path(), "q.xml", EMP_TEMPLATE);
    let values = write(dir.path(), "v.json", r#"{"min_sal": 1000, "depts": null}"#);

    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["--format", "json", "prune"])
        .arg(&template)
        .arg("--values")
        .arg(&values)
        .arg("--normalize")
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("json output");
    assert_eq!(json["sql"], "select ename from emp where 1 = 1 and sal >= :min_sal");
    assert_eq!(json["used_parameters"], serde_json::json!(["min_sal"]));
}

#[test]
fn prune_reads_stdin_and_expands_repeats() {
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["prune", "-", "--repeat", "depts=3", "--normalize"])
        .write_stdin("<query>select ename from emp where 1 = 1 <if>and deptno in (<a sep=','>:depts</a>)</if></query>")
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(
        stdout_of(&output).trim(),
        "select ename from emp where 1 = 1 and deptno in (:depts0,:depts1,:depts2)"
    );
}

#[test]
fn prune_reports_malformed_templates() {
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["prune", "-"])
        .write_stdin("<query><if>open</query>")
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(stderr_of(&output).contains("error: [MalformedTemplate]"));
}

#[test]
fn eval_prints_the_result() {
    let dir = TempDir::new().expect("tempdir");
    let values = write(dir.path(), "v.json", r#"{"a": 5, "name": "KING"}"#);

    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["eval", "$a > 3 and $name = 'KING'", "--values"])
        .arg(&values)
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_of(&output).trim(), "true");

    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["eval", "$missing"])
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(stderr_of(&output).contains("[UnknownVariable]"));
}

#[test]
fn exec_runs_array_binds_and_queries() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("emp.db");

    cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["exec", "-", "--db"])
        .arg(&db)
        .write_stdin("create table emp (ename text primary key, sal integer)")
        .assert()
        .success();

    let insert = write(dir.path(), "insert.sql", "insert into emp values (:ename, :sal)");
    let binds = write(
        dir.path(),
        "binds.json",
        r#"{"ename": ["KING", "SCOTT", "ADAMS"], "sal": [5000, 3000, 1100]}"#,
    );
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .arg("exec")
        .arg(&insert)
        .arg("--db")
        .arg(&db)
        .arg("--binds")
        .arg(&binds)
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(stdout_of(&output).contains("rows affected: 3"));

    let query = write(
        dir.path(),
        "query.xml",
        "<query>select ename, sal from emp where 1 = 1 <if>and sal &gt;= :min_sal</if> order by sal desc</query>",
    );
    let min = write(dir.path(), "min.json", r#"{"min_sal": 2000}"#);
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["--format", "json", "exec"])
        .arg(&query)
        .arg("--db")
        .arg(&db)
        .arg("--binds")
        .arg(&min)
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("json output");
    assert_eq!(json["columns"], serde_json::json!(["ename", "sal"]));
    assert_eq!(json["rows"], serde_json::json!([["KING", 5000], ["SCOTT", 3000]]));
    assert_eq!(json["rows_affected"], 0);
}

#[test]
fn exec_lists_failed_rows() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("dept.db");
    cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["exec", "-", "--db"])
        .arg(&db)
        .write_stdin("create table dept (id integer primary key)")
        .assert()
        .success();

    let binds = write(dir.path(), "binds.json", r#"{"id": [1, 2, 1]}"#);
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["exec", "-", "--db"])
        .arg(&db)
        .arg("--binds")
        .arg(&binds)
        .write_stdin("insert into dept values (:id)")
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = stderr_of(&output);
    assert!(stderr.contains("[BatchPartialFailure] 1 of 3 batched rows failed"), "{stderr}");
    assert!(stderr.contains("row 2: unique violation"), "{stderr}");
}

#[test]
fn exec_reports_output_parameters() {
    let output = cargo_bin_cmd!("sqlweave")
        .env_remove("SQLWEAVE_CONFIG")
        .args(["--format", "json", "exec", "-", "--out", "doubled"])
        .write_stdin("select 21 * 2 as doubled")
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("json output");
    assert_eq!(json["out_values"]["doubled"], 42);
}

#[test]
fn config_file_sets_default_format() {
    let dir = TempDir::new().expect("tempdir");
    let config = write(
        dir.path(),
        "config.toml",
        "format = \"json\"\n\n[prune]\nnormalize = true\n\n[engine]\nbusy_timeout_ms = 100\n",
    );
    let output = cargo_bin_cmd!("sqlweave")
        .arg("--config")
        .arg(&config)
        .args(["prune", "-"])
        .write_stdin("<q>  select   1  </q>")
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("json output");
    assert_eq!(json["sql"], "select 1");

    let output = cargo_bin_cmd!("sqlweave")
        .env("SQLWEAVE_CONFIG", &config)
        .args(["--format", "text", "prune", "-"])
        .write_stdin("<q>select 1</q>")
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_of(&output).trim(), "select 1");
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("sqlweave")
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["eval", "1 = 1"])
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(stderr_of(&output).contains("does not exist"));
}

#[test]
fn invalid_config_format_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let config = write(dir.path(), "config.toml", "format = \"yaml\"\n");
    let output = cargo_bin_cmd!("sqlweave")
        .arg("--config")
        .arg(&config)
        .args(["eval", "1 = 1"])
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(stderr_of(&output).contains("output format 'yaml' is invalid"));
}
