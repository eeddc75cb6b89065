use crate::error::{Result, Span};
use crate::selector::Selector;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rule(Rule),
    Declaration(Declaration),
    Assignment(Assignment),
    Comment(Comment),
    Mixin(MixinNode),
    Include(IncludeNode),
    If(IfBlock),
    For(ForBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Style(StyleRule),
    Media(MediaRule),
    FontFace(FontFaceRule),
    Keyframes(KeyframesRule),
    Import(ImportRule),
    Unknown(UnknownRule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: Selector,
    /// 1 for a rule at the document root.
    pub depth: usize,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRule {
    pub query: String,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframesRule {
    pub name: String,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRule {
    pub url: ImportUrl,
}

/// Any at-rule without dedicated handling, e.g. `@charset` or `@supports`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownRule {
    pub name: String,
    pub prelude: String,
    pub children: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: Value,
    pub span: Span,
}

/// `$name: value;`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Value,
    /// Set by a trailing `!default`.
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixinNode {
    pub name: String,
    pub params: Vec<Parameter>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeNode {
    pub name: String,
    pub args: Option<Value>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub condition: Value,
    pub children: Vec<Node>,
    /// Body of a trailing `@else`; an `@else if` nests another [`IfBlock`].
    pub otherwise: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForBlock {
    pub variable: String,
    pub start: Value,
    pub end: Value,
    /// `through` includes the end bound, `to` stops before it.
    pub inclusive: bool,
    pub children: Vec<Node>,
}

/// The target of an `@import`, quotes and `url()` stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportUrl(pub String);

impl ImportUrl {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names a local document rather than an absolute url.
    pub fn is_path(&self) -> bool {
        !self.0.contains(':')
    }
}

impl std::fmt::Display for ImportUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "url('{}')", self.0)
    }
}

impl Rule {
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Rule::Style(rule) => Some(&rule.children),
            Rule::Media(rule) => Some(&rule.children),
            Rule::FontFace(rule) => Some(&rule.children),
            Rule::Keyframes(rule) => Some(&rule.children),
            Rule::Unknown(rule) => rule.children.as_deref(),
            Rule::Import(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Rule::Style(rule) => Some(&mut rule.children),
            Rule::Media(rule) => Some(&mut rule.children),
            Rule::FontFace(rule) => Some(&mut rule.children),
            Rule::Keyframes(rule) => Some(&mut rule.children),
            Rule::Unknown(rule) => rule.children.as_mut(),
            Rule::Import(_) => None,
        }
    }

    pub fn has_children(&self) -> bool {
        self.children().is_some_and(|children| !children.is_empty())
    }
}

impl Node {
    /// Whether an `@include` appears here or inside nested style rules.
    pub fn contains_include(&self) -> bool {
        match self {
            Node::Include(_) => true,
            Node::Rule(Rule::Style(rule)) => rule.children.iter().any(Node::contains_include),
            _ => false,
        }
    }

    /// Rewrites every value in this subtree, including selector
    /// interpolations. Mixin definitions are left alone.
    pub fn map_values<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        match self {
            Node::Declaration(decl) => decl.value = f(&decl.value)?,
            Node::Assignment(assign) => assign.value = f(&assign.value)?,
            Node::Include(include) => {
                if let Some(args) = &mut include.args {
                    *args = f(args)?;
                }
            }
            Node::If(block) => {
                block.condition = f(&block.condition)?;
                map_all(&mut block.children, f)?;
                map_all(&mut block.otherwise, f)?;
            }
            Node::For(block) => {
                block.start = f(&block.start)?;
                block.end = f(&block.end)?;
                map_all(&mut block.children, f)?;
            }
            Node::Rule(rule) => {
                if let Rule::Style(style) = rule {
                    style.selector.map_values(f)?;
                }
                if let Some(children) = rule.children_mut() {
                    map_all(children, f)?;
                }
            }
            Node::Mixin(_) | Node::Comment(_) => {}
        }
        Ok(())
    }
}

fn map_all<F>(nodes: &mut [Node], f: &mut F) -> Result<()>
where
    F: FnMut(&Value) -> Result<Value>,
{
    for node in nodes {
        node.map_values(f)?;
    }
    Ok(())
}
