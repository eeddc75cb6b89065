use tracing::{debug, trace, warn};

use crate::ast::{
    Assignment, Declaration, FontFaceRule, ForBlock, IfBlock, ImportRule, IncludeNode,
    KeyframesRule, MediaRule, Node, Rule, StyleRule, StyleSheet, UnknownRule,
};
use crate::compat::{self, Browser, BrowserType};
use crate::context::Context;
use crate::error::{CompileError, Result};
use crate::eval::{is_truthy, Evaluator};
use crate::loader::{resolve_import_path, Resolver, SOURCE_EXTENSION};
use crate::mixin::{self, Layered, MixinRegistry};
use crate::parser::parse;
use crate::scope::Scope;
use crate::selector::{self, Selector, SelectorToken};
use crate::session::{loop_bounds, Session};
use crate::value::{Function, Separator, Value, ValueList};

const INDENT: &str = "  ";

/// Firefox releases before this one need `@-moz-keyframes`.
const FIREFOX_UNPREFIXED_KEYFRAMES: f32 = 16.0;
/// Safari releases before this one need `@-webkit-keyframes`.
const SAFARI_UNPREFIXED_KEYFRAMES: f32 = 9.0;

/// Compiles a parsed stylesheet to CSS text.
pub fn emit_css(stylesheet: &StyleSheet, context: &Context) -> Result<String> {
    let mut writer = Writer::new(context);
    writer.write_stylesheet(stylesheet)?;
    Ok(writer.into_string())
}

impl StyleSheet {
    /// CSS for this sheet with a default [`Context`].
    pub fn to_css(&self) -> Result<String> {
        emit_css(self, &Context::new())
    }
}

/// Writes one document, and any documents it imports, as CSS.
pub struct Writer<'a> {
    context: &'a Context,
    resolver: Option<&'a dyn Resolver>,
    session: Session,
    /// Targets consulted for prefixes. Narrowed while writing `@keyframes`.
    browser_support: Vec<Browser>,
    /// Mixins declared by the documents written so far.
    mixins: MixinRegistry,
    out: String,
}

impl<'a> Writer<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self {
            context,
            resolver: None,
            session: Session::new(),
            browser_support: context.browsers().to_vec(),
            mixins: MixinRegistry::new(),
            out: String::new(),
        }
    }

    /// Inline local `@import`s through `resolver`. Without one they are
    /// written as plain `@import` rules.
    pub fn with_resolver(mut self, resolver: &'a dyn Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn write_stylesheet(&mut self, stylesheet: &StyleSheet) -> Result<()> {
        let context = self.context;
        let mut scope = context.scope().child();
        self.write_root(stylesheet, "", &mut scope)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn write_root(&mut self, sheet: &StyleSheet, path: &str, scope: &mut Scope<'_>) -> Result<()> {
        self.session.count_import(path)?;
        for node in &sheet.children {
            if let Node::Mixin(mixin) = node {
                self.mixins.register(mixin.clone());
            }
        }
        let mut emitted = false;
        self.write_root_nodes(&sheet.children, scope, &mut emitted)
    }

    fn write_root_nodes(
        &mut self,
        nodes: &[Node],
        scope: &mut Scope<'_>,
        emitted: &mut bool,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Mixin(_) => {}
                Node::Assignment(assignment) => assign(scope, assignment),
                Node::If(block) => {
                    let branch = self.choose_branch(block, scope)?;
                    self.write_root_nodes(branch, scope, emitted)?;
                }
                Node::For(block) => {
                    let Some((first, last)) = self.loop_range(block, scope)? else {
                        continue;
                    };
                    let mut child = scope.child();
                    for i in first..=last {
                        child.set(block.variable.clone(), Value::number(i as f64));
                        self.write_root_nodes(&block.children, &mut child, emitted)?;
                    }
                }
                Node::Include(include) => {
                    let body = self.expand_include(include, scope)?;
                    self.write_root_nodes(&body, scope, emitted)?;
                }
                Node::Declaration(decl) => {
                    warn!(name = %decl.name, at = %decl.span, "ignoring declaration outside of a rule");
                }
                Node::Comment(comment) => self.write_item(emitted, |w| {
                    w.out.push_str("/* ");
                    w.out.push_str(&comment.text);
                    w.out.push_str(" */");
                    Ok(())
                })?,
                Node::Rule(Rule::Import(import)) => {
                    self.write_item(emitted, |w| w.write_import(import, scope))?
                }
                Node::Rule(rule) => self.write_item(emitted, |w| w.write_rule(rule, 0, scope))?,
            }
        }
        Ok(())
    }

    /// Runs `write` as one root item, separated from the previous item by a
    /// newline. An item that writes nothing leaves no separator behind.
    fn write_item<F>(&mut self, emitted: &mut bool, write: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mark = self.out.len();
        if *emitted {
            self.out.push('\n');
        }
        let body = self.out.len();
        write(self)?;
        if self.out.len() == body {
            self.out.truncate(mark);
        } else {
            *emitted = true;
        }
        Ok(())
    }

    /// Evaluates `rule` against `scope`, then writes it.
    fn write_rule(&mut self, rule: &Rule, level: usize, scope: &Scope<'_>) -> Result<()> {
        let expanded = self.expand_rule(rule, scope)?;
        self.write_expanded(&expanded, level)
    }

    /// Writes a rule whose variables, includes and control flow are already
    /// evaluated.
    fn write_expanded(&mut self, rule: &Rule, level: usize) -> Result<()> {
        match rule {
            Rule::Style(style) => {
                for (i, flat) in flatten_rule(style)?.iter().enumerate() {
                    if i != 0 {
                        self.out.push('\n');
                    }
                    self.write_style_rule(flat, level)?;
                }
                Ok(())
            }
            Rule::Media(media) => {
                self.indent(level);
                self.out.push_str("@media ");
                self.out.push_str(&media.query);
                self.out.push(' ');
                self.write_block(&media.children, level)
            }
            Rule::FontFace(font_face) => {
                self.indent(level);
                self.out.push_str("@font-face ");
                self.write_block(&font_face.children, level)
            }
            Rule::Keyframes(keyframes) => self.write_keyframes(keyframes, level),
            Rule::Import(import) => {
                self.indent(level);
                write_import_rule(&mut self.out, import);
                Ok(())
            }
            Rule::Unknown(unknown) => self.write_unknown(unknown, level),
        }
    }

    fn write_style_rule(&mut self, rule: &StyleRule, level: usize) -> Result<()> {
        self.indent(level);
        self.write_selector(&rule.selector, level);
        self.out.push(' ');
        self.write_block(&rule.children, level)
    }

    fn write_selector(&mut self, selector: &Selector, level: usize) {
        for (i, alternative) in selector.alternatives.iter().enumerate() {
            if i != 0 {
                self.out.push_str(",\n");
                self.indent(level);
            }
            for token in alternative {
                match token {
                    SelectorToken::Text(text) => self.out.push_str(text),
                    SelectorToken::Space => self.out.push(' '),
                    SelectorToken::Parent => self.out.push('&'),
                    SelectorToken::Interpolation(value) => render(value, &mut self.out),
                }
            }
        }
    }

    fn write_unknown(&mut self, rule: &UnknownRule, level: usize) -> Result<()> {
        self.indent(level);
        self.out.push('@');
        self.out.push_str(&rule.name);
        if !rule.prelude.is_empty() {
            self.out.push(' ');
            self.out.push_str(&rule.prelude);
        }
        match &rule.children {
            Some(children) => {
                self.out.push(' ');
                self.write_block(children, level)
            }
            None => {
                self.out.push(';');
                Ok(())
            }
        }
    }

    /// Writes prefixed copies for legacy Firefox and Safari targets ahead of
    /// the standard block, each with prefixing narrowed to that browser.
    fn write_keyframes(&mut self, rule: &KeyframesRule, level: usize) -> Result<()> {
        let firefox = self.context.target_version(BrowserType::Firefox);
        let safari = self.context.target_version(BrowserType::Safari);
        let legacy = [
            (firefox > 0.0 && firefox < FIREFOX_UNPREFIXED_KEYFRAMES).then(|| Browser::firefox(firefox)),
            (safari > 0.0 && safari < SAFARI_UNPREFIXED_KEYFRAMES).then(|| Browser::safari(safari)),
        ];

        for browser in legacy.into_iter().flatten() {
            self.browser_support = vec![browser];
            self.indent(level);
            self.out.push('@');
            self.out.push_str(browser.prefix().text());
            self.out.push_str("keyframes ");
            self.out.push_str(&rule.name);
            self.out.push(' ');
            let result = self.write_block(&rule.children, level);
            self.browser_support = self.context.browsers().to_vec();
            result?;
            self.out.push('\n');
        }

        self.browser_support.clear();
        self.indent(level);
        self.out.push_str("@keyframes ");
        self.out.push_str(&rule.name);
        self.out.push(' ');
        let result = self.write_block(&rule.children, level);
        self.browser_support = self.context.browsers().to_vec();
        result
    }

    fn write_block(&mut self, children: &[Node], level: usize) -> Result<()> {
        if let [Node::Declaration(decl)] = children {
            if !self.needs_patch(decl) {
                self.out.push_str("{ ");
                self.write_declaration(decl, 0);
                self.out.push_str(" }");
                return Ok(());
            }
        }

        self.out.push_str("{\n");
        for child in children {
            let mark = self.out.len();
            match child {
                Node::Declaration(decl) => self.write_declaration(decl, level + 1),
                Node::Rule(rule) => self.write_expanded(rule, level + 1)?,
                // Evaluated away before a block is written.
                _ => {}
            }
            if self.out.len() != mark {
                self.out.push('\n');
            }
        }
        self.indent(level);
        self.out.push('}');
        Ok(())
    }

    fn needs_patch(&self, decl: &Declaration) -> bool {
        self.context
            .properties()
            .get(&decl.name)
            .is_some_and(|info| info.needs_expansion(&self.browser_support))
    }

    /// Writes the prefixed copies of `decl`, one per line, then the
    /// standard declaration without a trailing newline.
    fn write_declaration(&mut self, decl: &Declaration, level: usize) {
        let context = self.context;
        if let Some(info) = context.properties().get(&decl.name) {
            for patch in compat::patches(decl, info, &self.browser_support) {
                self.indent(level);
                self.write_pair(&patch.name, &patch.value);
                self.out.push('\n');
            }
        }
        self.indent(level);
        self.write_pair(&decl.name, &decl.value);
    }

    fn write_pair(&mut self, name: &str, value: &Value) {
        self.out.push_str(name);
        self.out.push_str(": ");
        render(value, &mut self.out);
        self.out.push(';');
    }

    /// Reduces `value` to what gets written: variables are looked up,
    /// arithmetic is evaluated and registered functions are called.
    /// Unregistered functions such as `translate` keep their name.
    fn resolve_value(&mut self, value: &Value, scope: &Scope<'_>) -> Result<Value> {
        self.session.descend()?;
        let result = self.resolve_inner(value, scope);
        self.session.ascend();
        result
    }

    fn resolve_inner(&mut self, value: &Value, scope: &Scope<'_>) -> Result<Value> {
        let context = self.context;
        Ok(match value {
            Value::Variable(variable) => {
                let resolved = scope.resolve(&variable.symbol)?;
                self.resolve_value(&resolved, scope)?
            }
            Value::Expression(_) => self.evaluator(scope).evaluate(value)?,
            Value::Function(function) if context.functions().contains(&function.name) => {
                self.evaluator(scope).call(function)?
            }
            Value::Function(function) => Value::Function(Function {
                name: function.name.clone(),
                args: Box::new(self.resolve_value(&function.args, scope)?),
            }),
            Value::List(list) => Value::List(ValueList {
                items: list
                    .items
                    .iter()
                    .map(|item| self.resolve_value(item, scope))
                    .collect::<Result<_>>()?,
                separator: list.separator,
            }),
            Value::Interpolated(parts) => Value::Interpolated(
                parts
                    .iter()
                    .map(|part| self.resolve_value(part, scope))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }

    fn evaluator<'s>(&'s mut self, scope: &'s Scope<'s>) -> Evaluator<'s> {
        Evaluator::new(self.context.functions(), scope, &mut self.session)
    }

    fn choose_branch<'n>(&mut self, block: &'n IfBlock, scope: &Scope<'_>) -> Result<&'n [Node]> {
        let condition = self.evaluator(scope).evaluate(&block.condition)?;
        Ok(if is_truthy(&condition) {
            &block.children
        } else {
            &block.otherwise
        })
    }

    fn loop_range(&mut self, block: &ForBlock, scope: &Scope<'_>) -> Result<Option<(i64, i64)>> {
        let mut evaluator = self.evaluator(scope);
        let start = evaluator.number(&block.start)? as i64;
        let end = evaluator.number(&block.end)? as i64;
        loop_bounds(start, end, block.inclusive)
    }

    fn expand_include(&mut self, include: &IncludeNode, scope: &Scope<'_>) -> Result<Vec<Node>> {
        let lookup = Layered {
            first: &self.mixins,
            fallback: self.context.mixins(),
        };
        mixin::expand_include(include, &lookup, scope, &mut self.session)
    }

    /// Copies `rule` with its selector interpolations and its body evaluated.
    /// The body runs in a child of `scope`.
    fn expand_rule(&mut self, rule: &Rule, scope: &Scope<'_>) -> Result<Rule> {
        let mut local = scope.child();
        Ok(match rule {
            Rule::Style(style) => {
                let mut selector = style.selector.clone();
                selector.map_values(&mut |value: &Value| self.resolve_value(value, scope))?;
                Rule::Style(StyleRule {
                    selector,
                    depth: style.depth,
                    children: self.expand_body(&style.children, &mut local)?,
                })
            }
            Rule::Media(media) => Rule::Media(MediaRule {
                query: media.query.clone(),
                children: self.expand_body(&media.children, &mut local)?,
            }),
            Rule::FontFace(font_face) => Rule::FontFace(FontFaceRule {
                children: self.expand_body(&font_face.children, &mut local)?,
            }),
            Rule::Keyframes(keyframes) => Rule::Keyframes(KeyframesRule {
                name: keyframes.name.clone(),
                children: self.expand_body(&keyframes.children, &mut local)?,
            }),
            Rule::Unknown(unknown) => Rule::Unknown(UnknownRule {
                name: unknown.name.clone(),
                prelude: unknown.prelude.clone(),
                children: match &unknown.children {
                    Some(children) => Some(self.expand_body(children, &mut local)?),
                    None => None,
                },
            }),
            Rule::Import(import) => Rule::Import(import.clone()),
        })
    }

    /// Runs the items of a block in order against `scope` and returns what
    /// remains to be written: declarations with resolved values and
    /// evaluated nested rules.
    ///
    /// Assignments bind in `scope` as they are reached. A loop binds its
    /// counter in one child scope shared by all of its iterations.
    fn expand_body(&mut self, nodes: &[Node], scope: &mut Scope<'_>) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(nodes.len());
        self.expand_into(nodes, scope, &mut out)?;
        Ok(out)
    }

    fn expand_into(&mut self, nodes: &[Node], scope: &mut Scope<'_>, out: &mut Vec<Node>) -> Result<()> {
        for node in nodes {
            match node {
                Node::Declaration(decl) => {
                    self.session.count_node()?;
                    out.push(Node::Declaration(Declaration {
                        name: decl.name.clone(),
                        value: self.resolve_value(&decl.value, scope)?,
                        span: decl.span,
                    }));
                }
                Node::Assignment(assignment) => assign(scope, assignment),
                Node::If(block) => {
                    let branch = self.choose_branch(block, scope)?;
                    self.expand_into(branch, scope, out)?;
                }
                Node::For(block) => {
                    let Some((first, last)) = self.loop_range(block, scope)? else {
                        continue;
                    };
                    let mut inner = scope.child();
                    for i in first..=last {
                        inner.set(block.variable.clone(), Value::number(i as f64));
                        self.expand_into(&block.children, &mut inner, out)?;
                    }
                }
                Node::Include(include) => {
                    let body = self.expand_include(include, scope)?;
                    self.expand_into(&body, scope, out)?;
                }
                Node::Rule(rule) => out.push(Node::Rule(self.expand_rule(rule, scope)?)),
                Node::Comment(_) | Node::Mixin(_) => {}
            }
        }
        Ok(())
    }

    fn write_import(&mut self, import: &ImportRule, scope: &Scope<'_>) -> Result<()> {
        let target = self
            .resolver
            .and_then(|resolver| Some((resolver, resolve_import_path(&import.url, resolver.scoped_path())?)));
        let Some((resolver, path)) = target else {
            write_import_rule(&mut self.out, import);
            return Ok(());
        };

        self.out.push_str("/* ");
        self.out.push_str(&path);
        self.out.push_str(" */");

        let Some(text) = resolver.open(&path) else {
            warn!(%path, "import not found");
            self.out.push_str("\n/* NOT FOUND */");
            return Ok(());
        };
        debug!(%path, "inlining import");

        if !path.ends_with(&format!(".{SOURCE_EXTENSION}")) {
            let text = text.trim_end();
            if !text.is_empty() {
                self.out.push('\n');
                self.out.push_str(text);
            }
            return Ok(());
        }

        let outer = std::mem::take(&mut self.out);
        let result = parse(&text).and_then(|sheet| {
            let mut nested = scope.child();
            self.write_root(&sheet, &path, &mut nested)
        });
        let inner = std::mem::replace(&mut self.out, outer);
        match result {
            Ok(()) => {
                if !inner.is_empty() {
                    self.out.push('\n');
                    self.out.push_str(&inner);
                }
            }
            Err(err) => {
                warn!(%path, error = %err, "failed to compile import");
                render_import_failure(&mut self.out, &path, &err);
            }
        }
        Ok(())
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }
}

fn assign(scope: &mut Scope<'_>, assignment: &Assignment) {
    if assignment.default {
        scope.set_default(assignment.name.clone(), assignment.value.clone());
    } else {
        scope.set(assignment.name.clone(), assignment.value.clone());
    }
}

/// Flattens an evaluated style rule into rules without nesting.
///
/// The rule keeps its own remaining items and comes first. Each nested
/// rule follows in order, written after its own descendants. Rules left
/// without items are dropped.
fn flatten_rule(rule: &StyleRule) -> Result<Vec<StyleRule>> {
    if rule.selector.contains_parent() {
        return Err(CompileError::ParentOutsideRule(rule.selector.to_string()));
    }
    let mut root = StyleRule {
        selector: rule.selector.clone(),
        depth: rule.depth,
        children: Vec::new(),
    };
    let mut nested = Vec::new();
    for child in &rule.children {
        match child {
            Node::Rule(Rule::Style(style)) => nested.push(style),
            other => root.children.push(other.clone()),
        }
    }

    let mut flat = vec![root];
    let mut chain = vec![&rule.selector];
    for style in nested {
        flatten(style, &mut chain, &mut flat)?;
    }
    flat.retain(|rule| !rule.children.is_empty());
    Ok(flat)
}

/// Pushes `rule` and its nested rules, descendants first, onto `out`.
fn flatten<'r>(
    rule: &'r StyleRule,
    chain: &mut Vec<&'r Selector>,
    out: &mut Vec<StyleRule>,
) -> Result<()> {
    chain.push(&rule.selector);
    let selector = selector::expand(chain)?;
    trace!(%selector, depth = rule.depth, "expanded selector");

    let mut flat = StyleRule {
        selector,
        depth: rule.depth,
        children: Vec::new(),
    };
    for child in &rule.children {
        match child {
            Node::Rule(Rule::Style(nested)) => flatten(nested, chain, out)?,
            other => flat.children.push(other.clone()),
        }
    }
    chain.pop();
    out.push(flat);
    Ok(())
}

fn write_import_rule(out: &mut String, import: &ImportRule) {
    out.push_str("@import ");
    out.push_str(&import.url.to_string());
    out.push(';');
}

/// Writes resolved values. Interpolated parts are joined without spaces.
fn render(value: &Value, out: &mut String) {
    match value {
        Value::List(list) => {
            let separator = match list.separator {
                Separator::Space => " ",
                Separator::Comma => ", ",
            };
            for (i, item) in list.items.iter().enumerate() {
                if i != 0 {
                    out.push_str(separator);
                }
                render(item, out);
            }
        }
        Value::Function(function) => {
            out.push_str(&function.name);
            out.push('(');
            render(&function.args, out);
            out.push(')');
        }
        Value::Interpolated(parts) => {
            for part in parts {
                render(part, out);
            }
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Replaces a broken import with rules that blank the page, followed by a
/// comment pointing at the failing line.
fn render_import_failure(out: &mut String, path: &str, err: &CompileError) {
    out.push_str("\nbody, html { background-color: red !important; }");
    out.push_str("\nbody * { display: none; }");
    out.push_str("\n/* --- Parse Error in '");
    out.push_str(path);
    out.push_str("' : ");
    match err {
        CompileError::Syntax(syntax) => {
            out.push_str(&syntax.message);
            for line in &syntax.lines {
                out.push_str(&format!("\n{:>4}. ", line.number));
                if line.number == syntax.span.line {
                    out.push_str("* ");
                }
                out.push_str(&line.text);
            }
        }
        other => out.push_str(&other.to_string()),
    }
    out.push_str("\n*/");
}
