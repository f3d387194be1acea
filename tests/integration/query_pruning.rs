#![allow(missing_docs)]

mod common;

use sqlweave::{normalize_whitespace, prune, used_parameters, ErrorKind, RepeatCounts, Value, VariableContext};

fn repeats() -> RepeatCounts {
    [("paramStringList".to_string(), 3)].into_iter().collect()
}

fn values() -> VariableContext {
    let mut values = VariableContext::new();
    values.insert("paramStringEmpty".into(), Value::from(""));
    values.insert("paramStringNonNull".into(), Value::from("sharad"));
    values.insert("paramStringEmpty2".into(), Value::from(""));
    values.insert("paramStringNonNull2".into(), Value::from("sharad2"));
    values.insert(
        "paramStringList".into(),
        Value::Seq(vec![Value::from("p1"), Value::from("p2")]),
    );
    values.insert("paramStringListEmpty".into(), Value::Null);
    values
}

/// Prunes and returns the normalized SQL with its used parameters.
fn build(template: &str, values: &VariableContext) -> (String, Vec<String>) {
    common::init_tracing();
    let sql = prune(template, values, &repeats()).expect("prune");
    let used = used_parameters(&sql).into_iter().collect();
    (normalize_whitespace(&sql), used)
}

#[test]
fn empty_parameter_drops_its_fragment() {
    let (sql, used) = build(
        "
        <query>
        Hi there
        <if> Now you see me :paramStringEmpty </if>

          </query>
        ",
        &values(),
    );
    assert_eq!(sql, "Hi there");
    assert!(used.is_empty());
}

#[test]
fn given_parameter_keeps_its_fragment() {
    let (sql, used) = build(
        "<query>
        Hi there
        <if> Now you see me :paramStringNonNull </if>
        </query>",
        &values(),
    );
    assert_eq!(sql, "Hi there Now you see me :paramStringNonNull");
    assert_eq!(used, vec!["paramStringNonNull"]);
}

#[test]
fn else_branch_replaces_failed_guard() {
    let (sql, used) = build(
        "<query>
            Hi there
            <if> Now you see me :paramStringEmpty </if>
<else>No paramStringEmpty given</else>
</query>",
        &values(),
    );
    assert_eq!(sql, "Hi there No paramStringEmpty given");
    assert!(used.is_empty());

    let (sql, used) = build(
        "<query>
            Hi there
            <if> Now you see me :paramStringNonNull </if>
<else>No paramStringNonNull given</else>
</query>",
        &values(),
    );
    assert_eq!(sql, "Hi there Now you see me :paramStringNonNull");
    assert_eq!(used, vec!["paramStringNonNull"]);
}

#[test]
fn unterminated_end_tag_is_malformed() {
    let err = prune(
        "
<query>
            Hi there
            <if> Now you see me :param1 </if>
<else>No param1 given</else
</query>
",
        &values(),
        &repeats(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedTemplate);
}

#[test]
fn unknown_parameter_inside_if_is_rejected() {
    let err = prune(
        "<query>
            Hi there
            <if> Now you see me :param1 and :param2</if>
<else>No param1 given</else>
</query>",
        &values(),
        &repeats(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownParameter);
}

#[test]
fn every_placeholder_must_be_given() {
    let template = |a: &str, b: &str| {
        format!(
            "<query>
            Hi there
            <if> Now you see me :{a} and :{b}</if>
<else>{a} and {b} are null</else>
</query>"
        )
    };

    let (sql, used) = build(&template("paramStringEmpty", "paramStringEmpty2"), &values());
    assert_eq!(sql, "Hi there paramStringEmpty and paramStringEmpty2 are null");
    assert!(used.is_empty());

    let (sql, used) = build(&template("paramStringEmpty", "paramStringNonNull"), &values());
    assert_eq!(sql, "Hi there paramStringEmpty and paramStringNonNull are null");
    assert!(used.is_empty());

    let (sql, used) = build(&template("paramStringNonNull", "paramStringNonNull2"), &values());
    assert_eq!(sql, "Hi there Now you see me :paramStringNonNull and :paramStringNonNull2");
    assert_eq!(used, vec!["paramStringNonNull", "paramStringNonNull2"]);
}

#[test]
fn list_expands_to_repeat_count() {
    let (sql, used) = build(
        "<query>
        WHERE 1=1
    <if>
        AND EDIPS.EDI_ID IN (
            <a sep=', '>:paramStringList</a>
        )
    </if>
</query>",
        &values(),
    );
    assert_eq!(used.len(), 3);
    assert_eq!(
        sql,
        "WHERE 1=1 AND EDIPS.EDI_ID IN ( :paramStringList0, :paramStringList1, :paramStringList2 )"
    );
}

#[test]
fn null_list_prunes_expansion() {
    let (sql, used) = build(
        "<query>
        WHERE 1=1
<if>
AND EDIPS.EDI_ID IN (
<a sep=', '>:paramStringListEmpty</a>
)
</if>
</query>",
        &values(),
    );
    assert!(used.is_empty());
    assert_eq!(sql, "WHERE 1=1");
}

#[test]
fn elsif_chain_picks_first_match() {
    let template = "<query>
        You chose
    <if c='$choice = 1'>
        choice 1
    </if>
    <elsif c='$choice = 2'>
        choice 2
    </elsif>
    <elsif c='$choice = 3'>
        choice 3
    </elsif>
    <else>
        bad choice
    </else>
</query>";
    let mut vals = values();
    for (choice, expected) in [(3, "You chose choice 3"), (1, "You chose choice 1"), (9, "You chose bad choice")] {
        vals.insert("choice".into(), Value::from(choice));
        let (sql, _) = build(template, &vals);
        assert_eq!(sql, expected, "choice {choice}");
    }
}

#[test]
fn nested_chains_follow_their_own_guards() {
    let template = "<query>
        begin if
    <if c='$choice'>
        :choice given
        <if>:subchoice given</if>
        <else>No subchoice</else>
        is good
    </if>
    <else>
        other choice
        <if>your :subchoice</if>
        <else>No subchoice</else>
        is bad
    </else>
    end if
</query>";
    let cases: [(Value, Value, &str, &[&str]); 4] = [
        (
            Value::from(1),
            Value::from(1),
            "begin if :choice given :subchoice given is good end if",
            &["choice", "subchoice"],
        ),
        (
            Value::Null,
            Value::Null,
            "begin if other choice No subchoice is bad end if",
            &[],
        ),
        (
            Value::Null,
            Value::from("hello"),
            "begin if other choice your :subchoice is bad end if",
            &["subchoice"],
        ),
        (
            Value::from("hello"),
            Value::Null,
            "begin if :choice given No subchoice is good end if",
            &["choice"],
        ),
    ];
    let mut vals = values();
    for (choice, subchoice, expected, expected_used) in cases {
        vals.insert("choice".into(), choice);
        vals.insert("subchoice".into(), subchoice);
        let (sql, used) = build(template, &vals);
        assert_eq!(sql, expected);
        assert_eq!(used, expected_used);
    }
}

#[test]
fn explicit_outer_guard_with_implicit_inner_guards() {
    let template = "
	<query>
		SELECT *
		  FROM employees
		 WHERE
		<if c='$salary or $hire_date'>
			1 = 1
			<if>AND salary &gt;= :salary</if>
			<if>AND hire_date &gt;= :hire_date</if>
        </if>
		<else>
			rownum &lt; 20
		</else>
	</query>
";
    let cases = [
        (Value::Null, Value::Null, "SELECT * FROM employees WHERE rownum < 20"),
        (
            Value::Null,
            Value::from(222),
            "SELECT * FROM employees WHERE 1 = 1 AND hire_date >= :hire_date",
        ),
        (
            Value::from(1111),
            Value::Null,
            "SELECT * FROM employees WHERE 1 = 1 AND salary >= :salary",
        ),
        (
            Value::from(1111),
            Value::from(2222),
            "SELECT * FROM employees WHERE 1 = 1 AND salary >= :salary AND hire_date >= :hire_date",
        ),
    ];
    let mut vals = values();
    for (salary, hire_date, expected) in cases {
        vals.insert("salary".into(), salary);
        vals.insert("hire_date".into(), hire_date);
        let (sql, _) = build(template, &vals);
        assert_eq!(sql, expected);
    }
}

#[test]
fn unknown_variable_in_condition_is_reported() {
    let err = prune(
        "<query>x <if c='$nobody = 1'>y</if></query>",
        &values(),
        &repeats(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariable);
    assert_eq!(err.code(), "UnknownVariable");
}

#[test]
fn malformed_templates_report_position() {
    for template in [
        "<query><if>unterminated</query>",
        "<query><elsif c='$a'>x</elsif></query>",
        "<query><if c='$a'><a>:ids</a></if></query>",
        "<query><bogus/></query>",
        "<query>a < b</query>",
        "<query>x</query><query>y</query>",
    ] {
        let err = prune(template, &values(), &repeats()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTemplate, "{template}");
        match err {
            sqlweave::Error::MalformedTemplate { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column >= 1);
            }
            other => panic!("unexpected {other}"),
        }
    }
}
