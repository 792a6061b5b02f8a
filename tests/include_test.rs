use pjs::{CompileOptions, Engine, Error};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create template directory");
    }
    fs::write(&path, content).expect("Failed to write template");
    path
}

#[test]
fn test_directive_include_shares_bindings() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "partial.pjs", "Hello <%= name %>");
    let main = write(
        dir.path(),
        "main.pjs",
        "<% var name = \"Ann\"; %><% include \"partial\" %>!",
    );

    let engine = Engine::new();
    let output = engine
        .render_file(&main, &json!({}))
        .expect("Failed to render directive include");
    assert_eq!(output, "Hello Ann!");
}

#[test]
fn test_directive_include_unquoted_in_subdirectory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "shared/nav.pjs", "<nav><%= title %></nav>");
    let main = write(dir.path(), "page.pjs", "<%- include shared/nav %>body");

    let output = Engine::new()
        .render_file(&main, &json!({"title": "Home"}))
        .expect("Failed to render directive include");
    assert_eq!(output, "<nav>Home</nav>body");
}

#[test]
fn test_runtime_include_uses_overrides() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "partial.pjs", "Hello <%= name %>");
    let main = write(
        dir.path(),
        "main.pjs",
        "<% var name = \"Ann\"; %><%- include(\"partial\", {name: \"Bo\"}) %>",
    );

    let output = Engine::new()
        .render_file(&main, &json!({"name": "Cy"}))
        .expect("Failed to render runtime include");
    assert_eq!(output, "Hello Bo");
}

#[test]
fn test_runtime_include_sees_data_not_includer_bindings() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "partial.pjs", "Hello <%= name %>");
    let main = write(
        dir.path(),
        "main.pjs",
        "<% var name = \"Ann\"; %><%- include(\"partial\") %>",
    );

    let output = Engine::new()
        .render_file(&main, &json!({"name": "Cy"}))
        .expect("Failed to render runtime include");
    assert_eq!(output, "Hello Cy");
}

#[test]
fn test_missing_directive_include_names_both_files() {
    let dir = TempDir::new().unwrap();
    let main = write(dir.path(), "main.pjs", "<% include missing %>");

    let err = Engine::new()
        .render_file(&main, &json!({}))
        .expect_err("Missing include should fail compilation");
    assert!(matches!(err, Error::IncludeNotFound { .. }));
    let message = err.to_string();
    assert!(message.contains("'missing'"));
    assert!(message.contains("main.pjs"));
}

#[test]
fn test_directive_include_cycle() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.pjs", "a<% include b %>");
    write(dir.path(), "b.pjs", "b<% include a %>");

    let err = Engine::new()
        .render_file(dir.path().join("a.pjs"), &json!({}))
        .expect_err("Include cycle should fail compilation");
    assert!(matches!(err, Error::IncludeCycle(_)));
}

#[test]
fn test_directive_include_requires_filename() {
    let err = pjs::compile("<% include partial %>", &CompileOptions::default())
        .expect_err("Directive include without filename should fail");
    assert!(matches!(err, Error::MissingOption(_)));
}

#[test]
fn test_error_inside_included_code_reports_included_file() {
    let dir = TempDir::new().unwrap();
    let partial = write(dir.path(), "partial.pjs", "ok\n<%= nope %>\n");
    let main = write(dir.path(), "main.pjs", "top\n<% include partial %>\nbottom");

    let err = Engine::new()
        .render_file(&main, &json!({}))
        .expect_err("Unbound name inside include should fail");
    match &err {
        Error::Render { path, line, .. } => {
            assert_eq!(path.as_deref(), Some(partial.as_path()));
            assert_eq!(*line, 2);
        }
        other => panic!("Expected render error, got {:?}", other),
    }
    assert!(err.to_string().contains(" >> 2| <%= nope %>"));
}

#[test]
fn test_bom_is_stripped() {
    let dir = TempDir::new().unwrap();
    let main = write(dir.path(), "bom.pjs", "\u{feff}<%= 1 %>");
    let output = Engine::new().render_file(&main, &json!({})).unwrap();
    assert_eq!(output, "1");
}

/// Runs `f` on a thread with a main-thread sized stack
fn with_main_stack<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    std::thread::scope(|scope| {
        std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn_scoped(scope, f)
            .expect("Failed to spawn render thread")
            .join()
            .expect("Render thread panicked")
    })
}

#[test]
fn test_recursive_runtime_include_stops_at_depth_limit() {
    let dir = TempDir::new().unwrap();
    let main = write(dir.path(), "loop.pjs", "<%- include('loop') %>");

    let err = with_main_stack(|| Engine::new().render_file(&main, &json!({})))
        .expect_err("Self include should fail");
    assert!(matches!(
        err.root_cause(),
        Error::IncludeDepth { path, limit } if path == "loop" && *limit == pjs::template::MAX_INCLUDE_DEPTH
    ));
    assert_eq!(err.error_code(), "E_INCLUDE_DEPTH");
}

#[test]
fn test_mutual_runtime_include_reaches_callback() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.pjs", "a<%- include('b') %>");
    write(dir.path(), "b.pjs", "b<%- include('a') %>");

    let calls = with_main_stack(|| {
        let template = Engine::new()
            .compile_from_cache(&CompileOptions::default().with_filename(&a))
            .expect("Failed to compile template");
        let mut outcomes = Vec::new();
        template
            .render_with(&json!({}), |result| outcomes.push(result.is_err()))
            .expect("Line mapping routes every outcome to the callback");
        outcomes
    });
    assert_eq!(calls, vec![true]);
}

#[test]
fn test_recursive_runtime_include_over_data() {
    let dir = TempDir::new().unwrap();
    let node = write(
        dir.path(),
        "node.pjs",
        "<%= name %><% for (const child of children) { %>(<%- include('node', child) %>)<% } %>",
    );
    let tree = json!({
        "name": "a",
        "children": [{"name": "b", "children": [{"name": "c", "children": []}]}]
    });

    let output = Engine::new()
        .render_file(&node, &tree)
        .expect("Failed to render tree");
    assert_eq!(output, "a(b(c))");
}
