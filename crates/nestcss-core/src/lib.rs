pub mod ast;
pub mod compat;
pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod eval;
pub mod functions;
pub mod loader;
pub mod mixin;
pub mod parser;
pub mod scope;
pub mod selector;
pub mod session;
pub mod token;
pub mod value;

pub use ast::StyleSheet;
pub use compat::{Browser, BrowserType};
pub use config::{Config, ConfigError};
pub use context::Context;
pub use emitter::{emit_css, Writer};
pub use error::{CompileError, ErrorKind, Limit, Result};
pub use loader::{FsResolver, MemoryResolver, Resolver};

/// Parses and compiles `source`. Imports are written as `@import` rules.
pub fn compile(source: &str, context: &Context) -> Result<String> {
    let sheet = parser::parse(source)?;
    emit_css(&sheet, context)
}

/// Parses and compiles `source`, inlining local imports through `resolver`.
pub fn compile_with_resolver(
    source: &str,
    context: &Context,
    resolver: &dyn Resolver,
) -> Result<String> {
    let sheet = parser::parse(source)?;
    let mut writer = Writer::new(context).with_resolver(resolver);
    writer.write_stylesheet(&sheet)?;
    Ok(writer.into_string())
}
