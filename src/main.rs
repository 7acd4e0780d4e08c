use clap::{CommandFactory, Parser};
use marine_qc::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // No subcommand: show help and exit
    if args.command.is_none() {
        let _ = Args::command().print_help();
        println!();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(args) => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(anyhow::anyhow!("QC run interrupted by user"))
            }
        }
    });

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
