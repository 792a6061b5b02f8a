use pjs::{compile, CompileOptions, Error};
use serde_json::json;
use std::cell::Cell;
use std::thread;

fn render(text: &str, data: serde_json::Value) -> String {
    let template = compile(text, &CompileOptions::default()).expect("Failed to compile template");
    template.render(&data).expect("Failed to render template")
}

#[test]
fn test_literal_text_round_trips() {
    assert_eq!(
        render("Line 1\r\nLine 2\rLine 3 \"quoted\" \\ back", json!({})),
        "Line 1\nLine 2\nLine 3 \"quoted\" \\ back"
    );
}

#[test]
fn test_escaped_and_raw_output() {
    let options = CompileOptions::default().with_escape(|s| s.replace('<', "&lt;"));
    let escaped = compile("<%= x %>", &options).expect("Failed to compile escaped tag");
    let raw = compile("<%- x %>", &options).expect("Failed to compile raw tag");
    let data = json!({"x": "<b>"});
    assert_eq!(escaped.render(&data).unwrap(), "&lt;b>");
    assert_eq!(raw.render(&data).unwrap(), "<b>");
}

#[test]
fn test_default_escape_is_xml() {
    assert_eq!(
        render("<%= s %>", json!({"s": "<a href=\"x\">'&'</a>"})),
        "&lt;a href=&#34;x&#34;&gt;&#39;&amp;&#39;&lt;/a&gt;"
    );
}

#[test]
fn test_slurp_removes_exactly_one_linebreak() {
    assert_eq!(render("<% if (true) { %>\nX<% } -%>\nY", json!({})), "\nXY");
    assert_eq!(render("<% if (true) { -%>\n\nX<% } %>", json!({})), "\nX");
}

#[test]
fn test_trim_markers_strip_horizontal_whitespace() {
    assert_eq!(render("A\n  <%_ var a = 1 _%>  \nB<%= a %>", json!({})), "A\nB1");
}

#[test]
fn test_comment_and_literal_tags() {
    assert_eq!(render("a<%# ignored %>b <%% kept %>", json!({})), "ab <% kept %>");
}

#[test]
fn test_custom_delimiter() {
    let options = CompileOptions::default().with_delimiter('?');
    let template = compile("<?= a ?> <% a %>", &options).expect("Failed to compile template");
    assert_eq!(template.render(&json!({"a": 1})).unwrap(), "1 <% a %>");
}

#[test]
fn test_loop_over_data() {
    let text = "<ul>\n<% for (const user of users) { -%>\n  <li><%= user.name %></li>\n<% } -%>\n</ul>";
    let data = json!({"users": [{"name": "Ann"}, {"name": "Bo"}]});
    assert_eq!(render(text, data), "<ul>\n  <li>Ann</li>\n  <li>Bo</li>\n</ul>");
}

#[test]
fn test_unmatched_tag_is_compile_error() {
    let err = compile("before <% never closed", &CompileOptions::default())
        .expect_err("Unclosed tag should not compile");
    assert!(matches!(err, Error::UnmatchedTag(_)));
    assert!(err.is_compile_error());
    assert_eq!(err.to_string(), "Could not find matching close tag for \"<%\".");
}

#[test]
fn test_invalid_code_is_syntax_error_with_filename() {
    let options = CompileOptions::default().with_filename("views/broken.pjs");
    let err = compile("<% if ( %>", &options).expect_err("Invalid code should not compile");
    match err {
        Error::Syntax { filename, .. } => assert_eq!(filename, "views/broken.pjs"),
        other => panic!("Expected syntax error, got {:?}", other),
    }
}

#[test]
fn test_unbound_name_without_line_mapping() {
    let options = CompileOptions::default().with_compile_debug(false);
    let template = compile("<%= ghost %>", &options).expect("Failed to compile template");
    let err = template.render(&json!({})).expect_err("Unbound name should fail");
    assert!(matches!(err, Error::UnboundName(ref name) if name == "ghost"));
}

#[test]
fn test_callback_invoked_exactly_once() {
    let templates = ["plain", "<%= 1 %>", "<% done(); %>x", "<%= nope %>", "<% if (a) { done(); } %>y"];
    for text in templates {
        let template = compile(text, &CompileOptions::default()).expect("Failed to compile template");
        let calls = Cell::new(0);
        template
            .render_with(&json!({"a": true}), |_| calls.set(calls.get() + 1))
            .expect("Line mapping routes every outcome to the callback");
        assert_eq!(calls.get(), 1, "callback count for {:?}", text);
    }
}

#[test]
fn test_done_defers_rest_of_chunk_to_tail() {
    let text = "<% var items = []; if (ready) { done(); items.push(1) } %><%= items.length %>";
    assert_eq!(render(text, json!({"ready": true})), "0");
    // The output tag belongs to the branch the tail closes
    assert_eq!(render(text, json!({"ready": false})), "");
}

#[test]
fn test_host_function() {
    let options = CompileOptions::default().with_function("upper", |args| {
        Ok(pjs::Value::String(
            args.first().map(|v| v.to_string()).unwrap_or_default().to_uppercase(),
        ))
    });
    let template = compile("<%= upper(name) %>", &options).expect("Failed to compile template");
    assert_eq!(template.render(&json!({"name": "ann"})).unwrap(), "ANN");
}

#[test]
fn test_second_done_in_chunk_stays_in_tail() {
    let text = "<% var n = 1; done(); n = n + 1; done(); n = n * 10 %><%= n %>";
    assert_eq!(render(text, json!({})), "1");
}

#[test]
fn test_break_outside_loop_is_compile_error() {
    let err = compile("a<% break %>b", &CompileOptions::default())
        .expect_err("Stray break should not compile");
    assert!(matches!(err, Error::Syntax { .. }));
    assert!(err.is_compile_error());
}

#[test]
fn test_concurrent_renders_share_one_template() {
    let template = compile(
        "<% for (const item of items) { %><%= item * factor %>,<% } %>",
        &CompileOptions::default(),
    )
    .expect("Failed to compile template");

    let outputs: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|factor| {
                let template = &template;
                scope.spawn(move || {
                    template
                        .render(&json!({"items": [1, 2, 3], "factor": factor}))
                        .expect("Failed to render template")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("Render thread panicked"))
            .collect()
    });

    for (factor, output) in outputs.iter().enumerate() {
        assert_eq!(output, &format!("{},{},{},", factor, factor * 2, factor * 3));
    }
}
