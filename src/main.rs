use clap::Parser;
use logsentry::cli::{setup_logging, Cli};
use logsentry::output;
use logsentry::CheckOutcome;
use std::process;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            let rendered = e.to_string();
            let detail = rendered
                .lines()
                .next()
                .unwrap_or("invalid arguments")
                .trim_start_matches("error: ");
            process::exit(output::print_outcome(&CheckOutcome::unknown(detail)));
        }
    };

    setup_logging(cli.verbose);
    let outcome = cli.run();
    process::exit(output::print_outcome(&outcome));
}
