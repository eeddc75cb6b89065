use std::collections::HashMap;

use crate::error::{CompileError, Limit, Result};
use crate::value::Value;

/// Variable bindings for one level of the document.
///
/// Child scopes borrow their parent, so a child can never outlive the
/// scope it was opened in.
#[derive(Debug, Default)]
pub struct Scope<'p> {
    vars: HashMap<String, Value>,
    parent: Option<&'p Scope<'p>>,
}

impl Scope<'static> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'p> Scope<'p> {
    pub fn child(&self) -> Scope<'_> {
        Scope {
            vars: HashMap::new(),
            parent: Some(self),
        }
    }

    pub fn parent(&self) -> Option<&Scope<'p>> {
        self.parent
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Binds `name` only when nothing up the chain defines it yet.
    pub fn set_default(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if self.lookup(&name).is_none() {
            self.vars.insert(name, value);
        }
    }

    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// The raw binding for `name`, searching outward without following aliases.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.vars.get(name) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolves `name` to a concrete value.
    ///
    /// A binding that is itself a variable reference is followed from the
    /// scope it was found in. A binding naming itself is an error, and long
    /// alias chains are cut off by [`Limit::Resolution`]. An unknown name
    /// yields [`Value::Undefined`].
    pub fn resolve(&self, name: &str) -> Result<Value> {
        let mut scope: &Scope<'_> = self;
        let mut name = name.to_string();
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            if attempts > Limit::Resolution.max() {
                return Err(CompileError::limit_with(Limit::Resolution, format!("${name}")));
            }
            match scope.vars.get(&name) {
                Some(Value::Variable(alias)) => {
                    if alias.symbol == name {
                        return Err(CompileError::SelfReference(name));
                    }
                    name = alias.symbol.clone();
                }
                Some(value) => return Ok(value.clone()),
                None => match scope.parent {
                    Some(parent) => scope = parent,
                    None => return Ok(Value::Undefined(name)),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn child_sees_parent_bindings() {
        let mut root = Scope::new();
        root.set("width", Value::unit(10.0, "px"));
        let mut child = root.child();
        child.set("height", Value::unit(5.0, "px"));
        assert_eq!(child.resolve("width").unwrap(), Value::unit(10.0, "px"));
        assert_eq!(child.resolve("height").unwrap(), Value::unit(5.0, "px"));
        assert!(root.resolve("height").unwrap().is_undefined());
    }

    #[test]
    fn child_binding_shadows_parent() {
        let mut root = Scope::new();
        root.set("color", Value::string("red"));
        let mut child = root.child();
        child.set("color", Value::string("blue"));
        assert_eq!(child.resolve("color").unwrap(), Value::string("blue"));
        assert_eq!(root.resolve("color").unwrap(), Value::string("red"));
    }

    #[test]
    fn aliases_are_followed() {
        let mut root = Scope::new();
        root.set("base", Value::unit(4.0, "px"));
        root.set("gap", Value::variable("base"));
        let child = root.child();
        assert_eq!(child.resolve("gap").unwrap(), Value::unit(4.0, "px"));
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut root = Scope::new();
        root.set("a", Value::variable("a"));
        let err = root.resolve("a").unwrap_err();
        assert!(matches!(err, CompileError::SelfReference(ref name) if name == "a"));
    }

    #[test]
    fn alias_cycle_hits_the_resolution_limit() {
        let mut root = Scope::new();
        root.set("a", Value::variable("b"));
        root.set("b", Value::variable("a"));
        let err = root.resolve("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert_eq!(err.limit_kind(), Some(Limit::Resolution));
    }

    #[test]
    fn set_default_keeps_existing_bindings() {
        let mut root = Scope::new();
        root.set("size", Value::unit(2.0, "em"));
        let mut child = root.child();
        child.set_default("size", Value::unit(1.0, "em"));
        child.set_default("weight", Value::string("bold"));
        assert_eq!(child.resolve("size").unwrap(), Value::unit(2.0, "em"));
        assert_eq!(child.get_local("weight"), Some(&Value::string("bold")));
        assert_eq!(child.len(), 1);
    }
}
