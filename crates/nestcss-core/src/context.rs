use crate::ast::MixinNode;
use crate::compat::{Browser, BrowserType, PropertyTable};
use crate::functions::FunctionTable;
use crate::mixin::MixinRegistry;
use crate::scope::Scope;
use crate::value::Value;

/// Everything a compilation reads but never changes: browser targets,
/// shared mixins, functions, property metadata and seeded variables.
#[derive(Debug)]
pub struct Context {
    browsers: Vec<Browser>,
    mixins: MixinRegistry,
    functions: FunctionTable,
    properties: PropertyTable,
    scope: Scope<'static>,
}

impl Context {
    /// No browser targets, built-in functions and the standard property table.
    pub fn new() -> Self {
        Self {
            browsers: Vec::new(),
            mixins: MixinRegistry::new(),
            functions: FunctionTable::with_builtins(),
            properties: PropertyTable::standard(),
            scope: Scope::new(),
        }
    }

    pub fn with_browsers(mut self, browsers: impl IntoIterator<Item = Browser>) -> Self {
        self.browsers = browsers.into_iter().collect();
        self
    }

    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_properties(mut self, properties: PropertyTable) -> Self {
        self.properties = properties;
        self
    }

    pub fn register_mixin(&mut self, mixin: MixinNode) {
        self.mixins.register(mixin);
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.scope.set(name, value);
    }

    pub fn browsers(&self) -> &[Browser] {
        &self.browsers
    }

    pub fn mixins(&self) -> &MixinRegistry {
        &self.mixins
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    /// The configured version for `kind`, or 0 when it is not targeted.
    pub fn target_version(&self, kind: BrowserType) -> f32 {
        self.browsers
            .iter()
            .find(|browser| browser.kind == kind)
            .map_or(0.0, |browser| browser.version)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
