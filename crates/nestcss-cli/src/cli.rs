use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "nestcss")]
#[command(about = "Compiles nested, variable-aware stylesheets to CSS")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
    Build {
        input: String,
        /// Write CSS here instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
        /// JSON file with browser targets and variables.
        #[arg(short, long)]
        config: Option<String>,
        /// Extra browser target, e.g. `chrome:30`. May be repeated.
        #[arg(short, long)]
        browser: Vec<String>,
        #[arg(short, long)]
        verbose: bool,
    },
}
