mod cli;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use nestcss_core::{compile_with_resolver, Browser, Config, Context, FsResolver};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            browser,
            verbose,
        } => {
            init_logging(verbose);
            build(&input, output.as_deref(), config.as_deref(), &browser)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(input: &str, output: Option<&str>, config: Option<&str>, browsers: &[String]) -> Result<()> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    for target in browsers {
        let browser: Browser = target.parse().map_err(|err: String| anyhow!(err))?;
        config.browsers.push(browser);
    }
    let context: Context = config.into_context()?;

    let src = fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?;
    let root = Path::new(input).parent().unwrap_or_else(|| Path::new("."));
    let resolver = FsResolver::new(root);

    let css = compile_with_resolver(&src, &context, &resolver)
        .with_context(|| format!("Failed to compile {input}"))?;

    match output {
        Some(path) => {
            fs::write(path, css).with_context(|| format!("Failed to write {path}"))?;
            info!(input, output = path, "compiled");
        }
        None => println!("{css}"),
    }
    Ok(())
}
