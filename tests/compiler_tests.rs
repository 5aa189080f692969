//! Script toolchain integration tests
//!
//! Runs sources through compile, minify and concatenation the way a bundle
//! task does and checks the code and maps that come out.

use percolate::bundle::{concat, Part};
use percolate::compiler::{compile, CompileOptions};
use percolate::minify::{minify, MinifyOptions};
use percolate::sourcemap::SourceMap;

const CONTROLLER: &str = r#"class Counter
  constructor: (@start = 0) ->
    @count = @start

  increment: (step = 1) ->
    @count += step
    @count

counter = new Counter 5
counter.increment() for i in [1..3]
console.log "count: #{counter.count}"
"#;

const HELPERS: &str = "greet = (name) ->\n  if name? then \"hi #{name}\" else \"hi\"\n\nconsole.log greet 'you'\n";

fn compiled(source: &str, path: &str) -> percolate::compiler::Compiled {
    let options = CompileOptions::new(path).with_filename("all.min.js").with_content(true);
    compile(source, &options).unwrap_or_else(|e| panic!("{} failed: {}", path, e))
}

fn minified(source: &str, path: &str) -> Part {
    let unit = compiled(source, path);
    let out = minify(&unit.js, &unit.map, &MinifyOptions::default()).unwrap();
    Part { code: out.code, map: out.map }
}

// ============================================================================
// Compilation
// ============================================================================

#[test]
fn test_compile_is_deterministic() {
    let first = compiled(CONTROLLER, "client/counter.coffee");
    let second = compiled(CONTROLLER, "client/counter.coffee");
    assert_eq!(first.js, second.js);
    assert_eq!(first.map.to_json(), second.map.to_json());
}

#[test]
fn test_compile_class_program() {
    let out = compiled(CONTROLLER, "client/counter.coffee");
    assert!(out.js.starts_with("(function() {\n"));
    assert!(out.js.contains("Counter = (function() {"), "{}", out.js);
    assert!(out.js.contains("Counter.prototype.increment = function("), "{}", out.js);
    assert!(out.js.contains("new Counter(5)"), "{}", out.js);
}

#[test]
fn test_compile_bare_omits_wrapper() {
    let options = CompileOptions::new("a.coffee").with_bare(true);
    let out = compile("x = 1\n", &options).unwrap();
    assert_eq!(out.js, "var x;\n\nx = 1;\n");
}

#[test]
fn test_compile_map_points_into_source() {
    let out = compiled(HELPERS, "client/helpers.coffee");
    let line = out.js.lines().position(|l| l.contains("console.log(greet(")).unwrap() as u32;
    let origin = out.map.lookup(line, 4).unwrap();
    assert_eq!(origin.original_line, 3);
    assert_eq!(out.map.sources(), ["client/helpers.coffee".to_string()]);
}

#[test]
fn test_compile_error_reports_position() {
    let err = compile("ok = 1\n\nbad = ->\n  var = 3\n", &CompileOptions::new("bad.coffee")).unwrap_err();
    assert_eq!(err.line, 4);
    assert!(err.column >= 1);
}

// ============================================================================
// Minification
// ============================================================================

#[test]
fn test_minify_keeps_identifier_names() {
    let part = minified(CONTROLLER, "client/counter.coffee");
    for name in ["Counter", "increment", "counter", "count", "start"] {
        assert!(part.code.contains(name), "{} renamed in {}", name, part.code);
    }
    assert!(!part.code.contains("  "), "{}", part.code);
}

#[test]
fn test_minify_shrinks_output() {
    let unit = compiled(CONTROLLER, "client/counter.coffee");
    let out = minify(&unit.js, &unit.map, &MinifyOptions::default()).unwrap();
    assert!(out.code.len() < unit.js.len());
}

#[test]
fn test_minify_map_keeps_sources_content() {
    let part = minified(HELPERS, "client/helpers.coffee");
    assert_eq!(part.map.sources(), ["client/helpers.coffee".to_string()]);
    assert_eq!(part.map.source_content(0), Some(HELPERS));
}

#[test]
fn test_minified_call_maps_to_its_source_line() {
    let part = minified(HELPERS, "client/helpers.coffee");
    let (line, column) = part
        .code
        .lines()
        .enumerate()
        .find_map(|(i, l)| l.find("console.log(greet(").map(|c| (i as u32, c as u32)))
        .unwrap();
    let origin = part.map.lookup(line, column).unwrap();
    assert_eq!(origin.original_line, 3);
}

// ============================================================================
// Concatenation
// ============================================================================

#[test]
fn test_concat_keeps_file_order() {
    let bundle = concat(
        "all.min.js",
        &[minified(CONTROLLER, "client/counter.coffee"), minified(HELPERS, "app.coffee")],
    );
    let counter = bundle.code.find("Counter").unwrap();
    let greet = bundle.code.find("greet").unwrap();
    assert!(counter < greet);
    assert_eq!(bundle.map.sources(), ["client/counter.coffee".to_string(), "app.coffee".to_string()]);
}

#[test]
fn test_concat_map_survives_json() {
    let bundle = concat(
        "all.min.js",
        &[minified(CONTROLLER, "client/counter.coffee"), minified(HELPERS, "app.coffee")],
    );
    let parsed = SourceMap::from_json(&bundle.map.to_json()).unwrap();
    assert_eq!(parsed.mappings(), bundle.map.mappings());
    assert_eq!(parsed.file(), Some("all.min.js"));

    let last_line = bundle.code.lines().count() as u32 - 1;
    let origin = parsed.lookup(last_line, 0).unwrap();
    assert_eq!(parsed.sources()[origin.source as usize], "app.coffee");
}
