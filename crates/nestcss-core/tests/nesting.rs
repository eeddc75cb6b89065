use nestcss_core::ast::{Node, Rule};
use nestcss_core::selector::{expand, Selector};
use nestcss_core::{CompileError, Limit, StyleSheet};

fn css(src: &str) -> String {
    StyleSheet::parse(src.trim())
        .and_then(|sheet| sheet.to_css())
        .expect("compile")
}

#[test]
fn flat_rules_are_unchanged() {
    let src = ".a { color: red; }\n.b {\n  margin: 0;\n  padding: 0;\n}";
    assert_eq!(css(src), src);
}

#[test]
fn parent_reference_joins_without_space() {
    assert_eq!(css("div { &.hide { display: none; } }"), "div.hide { display: none; }");
}

#[test]
fn nested_selector_list() {
    assert_eq!(
        css("div {\n  input,\n  textarea {\n    display: block;\n  }\n}"),
        "div input,\ndiv textarea { display: block; }"
    );
}

#[test]
fn parent_reference_after_ancestor() {
    assert_eq!(css(".hide { body & { display: none; } }"), "body .hide { display: none; }");
}

#[test]
fn selector_list_cross_product() {
    assert_eq!(
        css("#header { .inner { h1, ul { display: table-cell; } } }"),
        "#header .inner h1,\n#header .inner ul { display: table-cell; }"
    );
    assert_eq!(
        css("div, span { .hide { display: none; } }"),
        "div .hide,\nspan .hide { display: none; }"
    );
}

#[test]
fn parent_reference_in_every_alternative() {
    assert_eq!(
        css("div { &.hide, &.hidden { display: none; } }"),
        "div.hide,\ndiv.hidden { display: none; }"
    );
}

#[test]
fn nested_rules_follow_their_descendants() {
    let src = r#"
#networkLinks .block {
  .edit {
    opacity: 0;

    &:before {
      font-family: 'carbon';
    }
  }
}"#;
    assert_eq!(
        css(src),
        "#networkLinks .block .edit:before { font-family: 'carbon'; }\n\
         #networkLinks .block .edit { opacity: 0; }"
    );
}

#[test]
fn nested_multiselector_with_parent_reference() {
    let src = r#"
.details {
  max-width: 60rem;

  .description {
    ul {
      list-style: disc;
    }
    p, ul, ol {
      font-size: 1.2em;

      &:last-child {
        margin-bottom: 0;
      }
    }
  }
}"#;
    assert_eq!(
        css(src),
        ".details { max-width: 60rem; }\n\
         .details .description ul { list-style: disc; }\n\
         .details .description p:last-child,\n\
         .details .description ul:last-child,\n\
         .details .description ol:last-child { margin-bottom: 0; }\n\
         .details .description p,\n\
         .details .description ul,\n\
         .details .description ol { font-size: 1.2em; }"
    );
}

#[test]
fn nested_style_rewriter() {
    let src = r#"
nav {
  display: block;
  ul {
    margin: 0;
    padding: 0;
    list-style: none;
  }

  li { display: inline-block; }

  a {
    display: block;
    padding: 6px 12px;
    text-decoration: none;
  }
}"#;
    assert_eq!(
        css(src),
        "nav { display: block; }\n\
         nav ul {\n  margin: 0;\n  padding: 0;\n  list-style: none;\n}\n\
         nav li { display: inline-block; }\n\
         nav a {\n  display: block;\n  padding: 6px 12px;\n  text-decoration: none;\n}"
    );
}

#[test]
fn nested_multiselector() {
    let src = r#"
#header {
  min-height: 80px;

  a {
    color: rgba(255,255,255,0.6);
  }

  header a {
      color: #fcfcfc;
  }

  .inner {
    display: table;

    h1, ul {
      display: table-cell;
    }

    h1 {
      font-size: 16px;
    }

    ul {
      padding-left: 20px;

      li {
        display: inline-block;
      }
    }
  }
}"#;
    assert_eq!(
        css(src),
        "#header { min-height: 80px; }\n\
         #header a { color: rgba(255, 255, 255, 0.6); }\n\
         #header header a { color: #fcfcfc; }\n\
         #header .inner h1,\n\
         #header .inner ul { display: table-cell; }\n\
         #header .inner h1 { font-size: 16px; }\n\
         #header .inner ul li { display: inline-block; }\n\
         #header .inner ul { padding-left: 20px; }\n\
         #header .inner { display: table; }"
    );
}

#[test]
fn depth_is_recorded_and_expansion_uses_the_chain() {
    let sheet = StyleSheet::parse(
        "#header { .inner { h1, ul { display: table-cell; vertical-align: middle; } } }",
    )
    .unwrap();

    let mut chain: Vec<Selector> = Vec::new();
    let mut node = &sheet.children[0];
    while let Node::Rule(Rule::Style(rule)) = node {
        assert_eq!(rule.depth, chain.len() + 1);
        chain.push(rule.selector.clone());
        match rule.children.first() {
            Some(child @ Node::Rule(_)) => node = child,
            _ => break,
        }
    }
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[2].to_string(), "h1, ul");

    let refs: Vec<&Selector> = chain.iter().collect();
    assert_eq!(expand(&refs).unwrap().to_string(), "#header .inner h1, #header .inner ul");

    assert_eq!(
        sheet.to_css().unwrap(),
        "#header .inner h1,\n#header .inner ul {\n  display: table-cell;\n  vertical-align: middle;\n}"
    );
}

#[test]
fn seven_levels_is_too_deep() {
    let ok = "a { b { c { d { e { f { x: 1; } } } } } }";
    assert_eq!(css(ok), "a b c d e f { x: 1; }");

    let deep = "a { b { c { d { e { f { g { x: 1; } } } } } } }";
    let err = StyleSheet::parse(deep).unwrap().to_css().unwrap_err();
    assert_eq!(err.limit_kind(), Some(Limit::NestingDepth));
    assert!(err.to_string().contains("a b c d e f g"));
}

#[test]
fn two_selector_lists_fold_the_inner_list() {
    // Known limitation: only the first list is multiplied out.
    assert_eq!(css("a, b { c, d { x: 1; } }"), "a c d,\nb c d { x: 1; }");
}

#[test]
fn parent_reference_at_the_root_fails() {
    let err = StyleSheet::parse("& .x { a: b; }").unwrap().to_css().unwrap_err();
    assert!(matches!(err, CompileError::ParentOutsideRule(_)));
}
