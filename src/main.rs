use clap::Parser;

#[derive(Parser)]
#[command(name = "marking-pool")]
#[command(about = "Mark a stream of exams with a pool of concurrent workers", long_about = None)]
struct Cli {
    /// Number of workers in the pool (at least 2)
    #[arg(value_name = "WORKERS", value_parser = clap::value_parser!(u16).range(2..))]
    workers: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = marking_pool::run(usize::from(cli.workers)).await {
        eprintln!("marking-pool fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
