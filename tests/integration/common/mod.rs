#![allow(dead_code)]

use std::sync::Once;

use sqlweave::{Command, SqliteEngine, Value};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sqlweave=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

pub const DEPT_NOS: [i64; 3] = [10, 20, 30];
pub const DEPT_NAMES: [&str; 3] = ["ACCOUNTING", "RESEARCH", "SALES"];

/// In-memory database with an empty `departments` table.
pub fn departments_db() -> SqliteEngine {
    init_tracing();
    let mut engine = SqliteEngine::open_in_memory().expect("open sqlite");
    Command::new(
        "create table departments (
            department_id integer primary key,
            department_name text not null
        )",
    )
    .execute(&mut engine)
    .expect("create departments");
    engine
}

/// `departments_db` seeded with the standard three rows.
pub fn seeded_departments_db() -> SqliteEngine {
    let mut engine = departments_db();
    let mut insert = Command::new(
        "insert into departments (department_id, department_name) values (:deptno, :deptname)",
    );
    insert
        .bind_array("deptno", DEPT_NOS)
        .expect("bind deptno")
        .bind_array("deptname", DEPT_NAMES)
        .expect("bind deptname");
    insert.execute(&mut engine).expect("seed departments");
    engine
}

pub fn count_departments(engine: &mut SqliteEngine) -> i64 {
    let result = Command::new("select count(*) as n from departments")
        .execute(engine)
        .expect("count departments");
    match result.rows[0].get_by_name("n") {
        Some(Value::Int(n)) => *n,
        other => panic!("unexpected count {other:?}"),
    }
}
