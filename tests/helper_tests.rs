//! Integration tests for the built-in helper set and the opt-in
//! pagination helper.

use akibare::{render, AkibareError, RenderSettings, Template, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// if / unless
// ============================================================================

#[test]
fn if_renders_body_or_else() {
    let source = "{{#if v}}yes{{else}}no{{/if}}";
    assert_eq!(render(source, json!({"v": 1})).unwrap(), "yes");
    assert_eq!(render(source, json!({"v": 0})).unwrap(), "no");
    assert_eq!(render(source, json!({"v": ""})).unwrap(), "no");
    assert_eq!(render(source, json!({})).unwrap(), "no");
}

#[test]
fn if_calls_an_invocable_condition() {
    let mut context = BTreeMap::new();
    context.insert(
        "cond".to_string(),
        Value::Helper(Arc::new(|_this, _options, _args| {
            Ok(Some(Value::Bool(true)))
        })),
    );
    let template = Template::compile("{{#if cond}}on{{else}}off{{/if}}").unwrap();
    let out = template
        .render_value(Value::Map(context), &RenderSettings::new())
        .unwrap();
    assert_eq!(out, "on");
}

#[test]
fn unless_has_no_else_branch() {
    let source = "{{#unless v}}shown{{else}}never{{/unless}}";
    assert_eq!(render(source, json!({"v": false})).unwrap(), "shown");
    // a truthy condition renders nothing at all, not the else body
    assert_eq!(render(source, json!({"v": true})).unwrap(), "");
}

// ============================================================================
// with
// ============================================================================

#[test]
fn with_rebinds_and_falls_back_to_else() {
    let source = "{{#with user}}{{name}}{{else}}anon{{/with}}";
    assert_eq!(
        render(source, json!({"user": {"name": "Ada"}})).unwrap(),
        "Ada"
    );
    assert_eq!(render(source, json!({})).unwrap(), "anon");
}

#[test]
fn with_keeps_the_parent_reachable() {
    assert_eq!(
        render(
            "{{#with user}}{{name}}@{{../host}}{{/with}}",
            json!({"host": "example", "user": {"name": "a"}})
        )
        .unwrap(),
        "a@example"
    );
}

// ============================================================================
// each
// ============================================================================

#[test]
fn each_iterates_in_source_order() {
    assert_eq!(
        render("{{#each ns}}{{this}};{{/each}}", json!({"ns": [3, 1, 2]})).unwrap(),
        "3;1;2;"
    );
}

#[test]
fn each_sorts_by_field() {
    let data = json!({"items": [{"n": 2}, {"n": 3}, {"n": 1}]});
    assert_eq!(
        render("{{#each items order=\"n\"}}{{n}}{{/each}}", data.clone()).unwrap(),
        "123"
    );
    assert_eq!(
        render("{{#each items order=\"n desc\"}}{{n}}{{/each}}", data).unwrap(),
        "321"
    );
}

#[test]
fn each_applies_offset_and_limit() {
    let data = json!({"ns": [1, 2, 3, 4, 5]});
    assert_eq!(
        render("{{#each ns offset=1 limit=2}}{{this}}{{/each}}", data.clone()).unwrap(),
        "23"
    );
    assert_eq!(
        render("{{#each ns offset=4 limit=9}}{{this}}{{/each}}", data).unwrap(),
        "5"
    );
}

#[test]
fn each_over_nothing_renders_nothing() {
    let source = "{{#each ns}}x{{/each}}";
    assert_eq!(render(source, json!({"ns": []})).unwrap(), "");
    assert_eq!(render(source, json!({})).unwrap(), "");
}

#[test]
fn each_rejects_non_sequences() {
    let err = render("{{#each v}}x{{/each}}", json!({"v": 5})).unwrap_err();
    assert!(matches!(err, AkibareError::TypeError { .. }));
}

// ============================================================================
// compare / ifeq / if_match
// ============================================================================

fn compare(op: &str, data: serde_json::Value) -> String {
    let source = format!(
        "{{{{#compare a b operator=\"{}\"}}}}T{{{{else}}}}F{{{{/compare}}}}",
        op
    );
    render(&source, data).unwrap()
}

#[test]
fn compare_orders_values() {
    assert_eq!(compare("=", json!({"a": 1, "b": 1})), "T");
    assert_eq!(compare("<", json!({"a": 1, "b": 2})), "T");
    assert_eq!(compare(">", json!({"a": 1, "b": 2})), "F");
    assert_eq!(compare("<=", json!({"a": 2, "b": 2})), "T");
    assert_eq!(compare(">=", json!({"a": 1, "b": 2})), "F");
    assert_eq!(compare("<", json!({"a": "ant", "b": "bee"})), "T");
}

#[test]
fn compare_not_equal_still_tests_equality() {
    // longstanding quirk: "!=" behaves exactly like "="
    assert_eq!(compare("!=", json!({"a": 1, "b": 1})), "T");
    assert_eq!(compare("!=", json!({"a": 1, "b": 2})), "F");
}

#[test]
fn compare_membership_operators() {
    assert_eq!(compare("in", json!({"a": 2, "b": [1, 2, 3]})), "T");
    assert_eq!(compare("in", json!({"a": "ell", "b": "hello"})), "T");
    assert_eq!(compare("not in", json!({"a": 9, "b": [1, 2]})), "T");
}

#[test]
fn compare_rejects_unknown_operators() {
    let err = render(
        "{{#compare a b operator=\"~\"}}x{{/compare}}",
        json!({"a": 1, "b": 2}),
    )
    .unwrap_err();
    match err {
        AkibareError::Config { operator } => assert_eq!(operator, "~"),
        other => panic!("expected Config, got {:?}", other),
    }
}

#[test]
fn compare_rejects_unordered_pairs() {
    let err = render(
        "{{#compare a b operator=\"<\"}}x{{/compare}}",
        json!({"a": 1, "b": "two"}),
    )
    .unwrap_err();
    assert!(matches!(err, AkibareError::TypeError { .. }));
}

#[test]
fn ifeq_compares_for_equality() {
    let source = "{{#ifeq a b}}same{{else}}diff{{/ifeq}}";
    assert_eq!(render(source, json!({"a": "x", "b": "x"})).unwrap(), "same");
    assert_eq!(render(source, json!({"a": "x", "b": "y"})).unwrap(), "diff");
}

#[test]
fn if_match_anchors_at_the_start() {
    let source = "{{#if_match v \"/admin%\"}}admin{{else}}other{{/if_match}}";
    assert_eq!(
        render(source, json!({"v": "/admin/users"})).unwrap(),
        "admin"
    );
    assert_eq!(render(source, json!({"v": "/public/admin"})).unwrap(), "other");
}

#[test]
fn if_match_treats_absent_as_empty() {
    assert_eq!(
        render("{{#if_match v \"%\"}}any{{/if_match}}", json!({})).unwrap(),
        "any"
    );
    assert_eq!(
        render("{{#if_match v \"a%\"}}yes{{else}}no{{/if_match}}", json!({})).unwrap(),
        "no"
    );
}

// ============================================================================
// paginate
// ============================================================================

fn paginate_settings() -> RenderSettings {
    let mut settings = RenderSettings::new();
    settings.register_helper("paginate", akibare::helpers::paginate);
    settings
}

#[test]
fn paginate_computes_the_page_record() {
    let items: Vec<i64> = (1..=25).collect();
    let template = Template::compile(concat!(
        "{{#paginate items limit=10 offset=10}}",
        "page {{paginate.page_no}}/{{paginate.num_pages}} ",
        "items {{paginate.item_first}}-{{paginate.item_last}} of {{paginate.count}} ",
        "prev={{paginate.previous.page_no}} next={{paginate.next.page_no}} ",
        "[{{#each paginate.data}}{{this}},{{/each}}]",
        "{{/paginate}}"
    ))
    .unwrap();
    let out = template
        .render_with(json!({ "items": items }), &paginate_settings())
        .unwrap();
    assert_eq!(
        out,
        "page 2/3 items 11-20 of 25 prev=1 next=3 [11,12,13,14,15,16,17,18,19,20,]"
    );
}

#[test]
fn paginate_builds_a_page_window_with_urls() {
    let items: Vec<i64> = (1..=25).collect();
    let template = Template::compile(concat!(
        "{{#paginate items limit=10 offset=10 url=\"/list?q=a&offset=10\"}}",
        "{{#each paginate.parts}}",
        "{{page_no}}{{#if active}}*{{/if}}:{{{url}}} ",
        "{{/each}}",
        "{{/paginate}}"
    ))
    .unwrap();
    let out = template
        .render_with(json!({ "items": items }), &paginate_settings())
        .unwrap();
    assert_eq!(
        out,
        "1:/list?q=a&offset=0 2*:/list?q=a&offset=10 3:/list?q=a&offset=20 "
    );
}

#[test]
fn paginate_falsy_input_takes_the_else_branch() {
    let template =
        Template::compile("{{#paginate items}}rows{{else}}empty{{/paginate}}").unwrap();
    let out = template
        .render_with(json!({"items": []}), &paginate_settings())
        .unwrap();
    assert_eq!(out, "empty");
}

#[test]
fn paginate_single_page_has_no_window() {
    let template = Template::compile(concat!(
        "{{#paginate items}}",
        "{{paginate.page_no}}/{{paginate.num_pages}}",
        "{{#each paginate.parts}}!{{/each}}",
        "{{#if paginate.previous}}!{{/if}}{{#if paginate.next}}!{{/if}}",
        "{{/paginate}}"
    ))
    .unwrap();
    let out = template
        .render_with(json!({"items": [1, 2, 3]}), &paginate_settings())
        .unwrap();
    assert_eq!(out, "1/1");
}

// ============================================================================
// missing helper fallbacks
// ============================================================================

#[test]
fn block_over_scalar_rebinds_to_it() {
    assert_eq!(
        render("{{#v}}<{{this}}>{{/v}}", json!({"v": "s"})).unwrap(),
        "<s>"
    );
}

#[test]
fn helper_missing_override_intercepts_failures() {
    let mut settings = RenderSettings::new();
    settings.register_helper("helperMissing", |_this, _options, args| {
        let name = args.get(0).map(|v| v.render_string()).unwrap_or_default();
        Ok(Some(Value::from(format!("<missing:{}>", name))))
    });
    let template = Template::compile("{{nope arg}}").unwrap();
    assert_eq!(
        template
            .render_with(json!({"arg": 1}), &settings)
            .unwrap(),
        "&lt;missing:nope&gt;"
    );
}

#[test]
fn block_helper_missing_override_intercepts_blocks() {
    let mut settings = RenderSettings::new();
    settings.register_helper("blockHelperMissing", |this, options, _args| {
        Ok(Some(Value::Rendered(options.inverse_with(this)?)))
    });
    let template = Template::compile("{{#v}}body{{else}}flipped{{/v}}").unwrap();
    assert_eq!(
        template.render_with(json!({"v": true}), &settings).unwrap(),
        "flipped"
    );
}
