use std::fs;
use std::path::PathBuf;

use nestcss_core::{compile_with_resolver, Context, FsResolver, MemoryResolver};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/imports")
}

fn compile_fixture(name: &str) -> String {
    let src = fs::read_to_string(fixture_dir().join(name)).expect("read fixture");
    let resolver = FsResolver::new(fixture_dir());
    compile_with_resolver(&src, &Context::new(), &resolver).expect("compile fixture")
}

fn compile_source(src: &str) -> String {
    let resolver = FsResolver::new(fixture_dir());
    compile_with_resolver(src, &Context::new(), &resolver).expect("compile source")
}

#[test]
fn imports_are_inlined_in_place() {
    assert_eq!(
        compile_fixture("main.scss"),
        "/* base.scss */\n\
         .base {\n  color: #336699;\n  border-color: #c00;\n}\n\
         /* reset.css */\n\
         html { margin: 0; }\n\
         .button {\n  border-radius: 2px;\n  color: #c00;\n}"
    );
}

#[test]
fn imported_variables_stay_in_the_import() {
    let css = compile_fixture("leak.scss");
    assert!(css.contains("border-color: /* $accent not found */;"));
    assert!(css.ends_with(".after { color: /* $base-color not found */; }"));
}

#[test]
fn nested_paths_resolve_from_the_root() {
    assert_eq!(
        compile_fixture("scoped.scss"),
        "/* partials/buttons.scss */\n.btn { padding: 6px; }"
    );
}

#[test]
fn missing_imports_are_marked() {
    assert_eq!(
        compile_source("@import 'nowhere';\na { b: c; }"),
        "/* nowhere.scss */\n/* NOT FOUND */\na { b: c; }"
    );
}

#[test]
fn remote_imports_are_left_alone() {
    assert_eq!(
        compile_source("@import url(https://fonts.example.com/css);"),
        "@import url('https://fonts.example.com/css');"
    );
}

#[test]
fn broken_imports_do_not_abort_the_document() {
    let css = compile_source("@import 'broken';\n.after { a: b; }");
    assert_eq!(
        css,
        "/* broken.scss */\n\
         body, html { background-color: red !important; }\n\
         body * { display: none; }\n\
         /* --- Parse Error in 'broken.scss' : Unexpected token reading stylesheet. Was '}'\n   \
         2. .broken {\n   \
         3.   color: red;\n   \
         4. }\n   \
         5. * }\n\
         */\n\
         .after { a: b; }"
    );
}

#[test]
fn import_cycles_hit_the_import_limit() {
    // Two hundred nested documents need more than the default test stack.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| compile_source("@import 'cycle';"))
        .unwrap();
    let css = handle.join().unwrap();
    assert!(css.contains("Exceeded import limit of 200. Was cycle.scss"));
    assert_eq!(css.matches(".cycle { depth: 1; }").count(), 199);
}

#[test]
fn memory_resolver_uses_its_scoped_path() {
    let mut resolver = MemoryResolver::new().with_scoped_path("styles/");
    resolver.insert("styles/theme.scss", "$fg: #222;\n.t { color: $fg; }");
    let css = compile_with_resolver("@import 'theme';", &Context::new(), &resolver).unwrap();
    assert_eq!(css, "/* styles/theme.scss */\n.t { color: #222; }");
}
