//! Mixin registry and `@include` expansion.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{IncludeNode, MixinNode, Node, Rule};
use crate::error::{CompileError, Result};
use crate::scope::Scope;
use crate::session::Session;
use crate::value::{Separator, Value};

pub trait MixinLookup {
    fn find_mixin(&self, name: &str) -> Option<&MixinNode>;
}

#[derive(Clone, Debug, Default)]
pub struct MixinRegistry {
    mixins: HashMap<String, MixinNode>,
}

impl MixinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mixin`, replacing an earlier one of the same name.
    pub fn register(&mut self, mixin: MixinNode) {
        self.mixins.insert(mixin.name.clone(), mixin);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mixins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.mixins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixins.is_empty()
    }
}

impl MixinLookup for MixinRegistry {
    fn find_mixin(&self, name: &str) -> Option<&MixinNode> {
        self.mixins.get(name)
    }
}

/// Consults `first`, then `fallback`.
pub struct Layered<'a> {
    pub first: &'a MixinRegistry,
    pub fallback: &'a MixinRegistry,
}

impl MixinLookup for Layered<'_> {
    fn find_mixin(&self, name: &str) -> Option<&MixinNode> {
        self.first
            .find_mixin(name)
            .or_else(|| self.fallback.find_mixin(name))
    }
}

/// Binds a mixin's parameters positionally in a child of `scope`.
///
/// Arguments are resolved in the caller's scope. A parameter without an
/// argument takes its default, which may refer to earlier parameters.
pub fn bind_arguments<'s>(
    mixin: &MixinNode,
    args: Option<&Value>,
    scope: &'s Scope<'_>,
) -> Result<Scope<'s>> {
    let positional: Vec<Value> = match args {
        None => Vec::new(),
        Some(Value::List(list)) if list.separator == Separator::Comma => list.items.clone(),
        Some(other) => vec![other.clone()],
    };
    let mut bindings = scope.child();
    for (i, param) in mixin.params.iter().enumerate() {
        let value = match (positional.get(i), &param.default) {
            (Some(arg), _) => resolve_variables(arg, scope)?,
            (None, Some(default)) => resolve_variables(default, &bindings)?,
            (None, None) => Value::Undefined(param.name.clone()),
        };
        bindings.set(param.name.clone(), value);
    }
    Ok(bindings)
}

fn resolve_variables(value: &Value, scope: &Scope<'_>) -> Result<Value> {
    value.map_variables(&mut |variable| scope.resolve(&variable.symbol).map(Some))
}

/// Expands one `@include` into a fresh copy of the mixin body.
///
/// The mixin definition is never modified. Includes inside the body are
/// expanded in turn, all counting towards the session's include limit.
pub fn expand_include(
    include: &IncludeNode,
    mixins: &dyn MixinLookup,
    scope: &Scope<'_>,
    session: &mut Session,
) -> Result<Vec<Node>> {
    session.count_include(&include.name)?;
    let mixin = mixins
        .find_mixin(&include.name)
        .ok_or_else(|| CompileError::MixinNotRegistered(include.name.clone()))?;
    debug!(name = %include.name, at = %include.span, "expanding include");

    let bindings = bind_arguments(mixin, include.args.as_ref(), scope)?;
    let mut substitute = |value: &Value| {
        value.map_variables(&mut |variable| Ok(bindings.get_local(&variable.symbol).cloned()))
    };
    let mut body = mixin.children.clone();
    for node in &mut body {
        node.map_values(&mut substitute)?;
    }
    expand_includes(&mut body, mixins, scope, session)?;
    Ok(body)
}

/// Replaces every `@include` in `nodes`, and in nested style rules, with
/// its expansion.
pub fn expand_includes(
    nodes: &mut Vec<Node>,
    mixins: &dyn MixinLookup,
    scope: &Scope<'_>,
    session: &mut Session,
) -> Result<()> {
    if !nodes.iter().any(Node::contains_include) {
        return Ok(());
    }
    let mut expanded = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        match node {
            Node::Include(include) => {
                expanded.extend(expand_include(&include, mixins, scope, session)?);
            }
            Node::Rule(Rule::Style(mut rule)) => {
                expand_includes(&mut rule.children, mixins, scope, session)?;
                expanded.push(Node::Rule(Rule::Style(rule)));
            }
            other => expanded.push(other),
        }
    }
    *nodes = expanded;
    Ok(())
}
