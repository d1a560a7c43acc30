use std::io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use retire::cli::{Cli, run};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    if let Err(e) = run(cli, stdin.lock(), &mut stdout) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
