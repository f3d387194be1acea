#![allow(missing_docs)]

mod common;

use sqlweave::{Command, ExecuteResult, SqliteEngine, Value};

struct Employee {
    id: i64,
    first_name: &'static str,
    hire_date: &'static str,
    salary: f64,
}

const EMPLOYEES: [Employee; 5] = [
    Employee { id: 100, first_name: "Steven", hire_date: "2003-06-17", salary: 24000.0 },
    Employee { id: 101, first_name: "Neena", hire_date: "2005-09-21", salary: 17000.0 },
    Employee { id: 102, first_name: "Lex", hire_date: "2001-01-13", salary: 17000.0 },
    Employee { id: 103, first_name: "Alexander", hire_date: "2006-01-03", salary: 9000.0 },
    Employee { id: 104, first_name: "Bruce", hire_date: "2007-05-21", salary: 6000.0 },
];

const EMPLOYEE_QUERY: &str = "
<query>
    select employee_id, first_name, hire_date, salary
      from employees
     where 1 = 1
    <if>and salary &gt;= :salary</if>
    <if>and hire_date &gt;= :hire_date</if>
     order by employee_id
</query>";

fn employees_db() -> SqliteEngine {
    common::init_tracing();
    let mut engine = SqliteEngine::open_in_memory().unwrap();
    Command::new(
        "create table employees (
            employee_id integer primary key,
            first_name text,
            hire_date text,
            salary real
        )",
    )
    .execute(&mut engine)
    .unwrap();
    let mut insert = Command::new(
        "insert into employees values (:employee_id, :first_name, :hire_date, :salary)",
    );
    insert
        .bind_array("employee_id", EMPLOYEES.iter().map(|e| e.id))
        .unwrap()
        .bind_array("first_name", EMPLOYEES.iter().map(|e| e.first_name))
        .unwrap()
        .bind_array("hire_date", EMPLOYEES.iter().map(|e| e.hire_date))
        .unwrap()
        .bind_array("salary", EMPLOYEES.iter().map(|e| e.salary))
        .unwrap();
    insert.execute(&mut engine).unwrap();
    engine
}

fn run_employee_query(engine: &mut SqliteEngine, salary: Option<f64>, hire_date: Option<&str>) -> ExecuteResult {
    let mut cmd = Command::new(EMPLOYEE_QUERY);
    cmd.bind_scalar("salary", salary)
        .unwrap()
        .bind_scalar("hire_date", hire_date)
        .unwrap();
    cmd.execute(engine).unwrap()
}

fn ids(result: &ExecuteResult) -> Vec<i64> {
    result
        .rows
        .iter()
        .filter_map(|row| row.get_by_name("employee_id").and_then(Value::as_i64))
        .collect()
}

fn expected(filter: impl Fn(&Employee) -> bool) -> Vec<i64> {
    EMPLOYEES.iter().filter(|e| filter(e)).map(|e| e.id).collect()
}

#[test]
fn multiple_if_tags() {
    let mut engine = employees_db();

    let all = run_employee_query(&mut engine, None, None);
    assert_eq!(ids(&all), expected(|_| true));

    let by_salary = run_employee_query(&mut engine, Some(17000.0), None);
    assert_eq!(ids(&by_salary), expected(|e| e.salary >= 17000.0));

    let by_date = run_employee_query(&mut engine, None, Some("2005-01-01"));
    assert_eq!(ids(&by_date), expected(|e| e.hire_date >= "2005-01-01"));

    let both = run_employee_query(&mut engine, Some(10000.0), Some("2005-01-01"));
    assert_eq!(
        ids(&both),
        expected(|e| e.salary >= 10000.0 && e.hire_date >= "2005-01-01")
    );
}

#[test]
fn string_parameter() {
    let mut engine = employees_db();
    let mut cmd = Command::new(
        "select employee_id from employees where first_name like :first_name || '%' order by employee_id",
    );
    cmd.bind_scalar("first_name", "Ale").unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(ids(&result), expected(|e| e.first_name.starts_with("Ale")));
}

#[test]
fn integer_parameter() {
    let mut engine = employees_db();
    let mut cmd = Command::new(
        "select employee_id from employees where employee_id <= :employee_id order by employee_id",
    );
    cmd.bind_scalar("employee_id", 102).unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(ids(&result), expected(|e| e.id <= 102));
}

#[test]
fn null_parameter_is_retrieved() {
    let mut engine = employees_db();
    let mut cmd = Command::new("select :employee_id as employee_id, :hire_date as hire_date");
    cmd.bind_scalar("employee_id", Value::Null)
        .unwrap()
        .bind_scalar("hire_date", None::<&str>)
        .unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get_by_name("employee_id"), Some(&Value::Null));
    assert_eq!(result.rows[0].get_by_name("HIRE_DATE"), Some(&Value::Null));
    assert_eq!(result.rows_affected, 0);
}

#[test]
fn float_and_large_integer_round_trip() {
    let mut engine = employees_db();
    let mut cmd = Command::new("select :long_input as long_output, :ratio * 2 as doubled");
    cmd.bind_scalar("long_input", i64::MAX)
        .unwrap()
        .bind_scalar("ratio", 1.25)
        .unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    let row = &result.rows[0];
    assert_eq!(row.get(0), Some(&Value::Int(i64::MAX)));
    assert_eq!(row.get_by_name("doubled"), Some(&Value::Float(2.5)));
}

#[test]
fn list_binding_expands_in_clause() {
    let mut engine = employees_db();
    let mut cmd = Command::new(
        "<query>
           select employee_id from employees
            where 1 = 1
           <if>and employee_id in (<a>:ids</a>)</if>
            order by employee_id
         </query>",
    );
    cmd.bind_list("ids", [104, 100, 999]).unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(ids(&result), vec![100, 104]);

    let mut none = Command::new(cmd.text());
    none.bind_list("ids", Vec::<i64>::new()).unwrap();
    let result = none.execute(&mut engine).unwrap();
    assert_eq!(ids(&result), expected(|_| true));
}

#[test]
fn set_text_keeps_binds() {
    let mut engine = employees_db();
    let mut cmd = Command::new("select count(*) from employees where salary >= :salary");
    cmd.bind_scalar("salary", 17000.0).unwrap();
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::Int(3)));

    cmd.set_text("select count(*) from employees where salary < :salary");
    let result = cmd.execute(&mut engine).unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::Int(2)));
}
