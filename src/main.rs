use clap::Parser;
use flightdeck::cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = flightdeck::run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
