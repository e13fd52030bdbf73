use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pageshot")]
#[command(about = "Full-page web screenshot service")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "HTTP listen port (overrides PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Browser executable path (overrides PAGESHOT_CHROME_PATH)")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, help = "Maximum concurrent capture requests")]
    pub max_concurrent: Option<usize>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Directory of landing-page assets")]
    pub static_dir: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
