//! Plugin output: one line on stdout, severity as exit code

use crate::severity::CheckOutcome;
use std::io::{self, Write};

/// The outcome as a single line; embedded line breaks would be taken as long output
pub fn render_line(outcome: &CheckOutcome) -> String {
    outcome
        .message
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the outcome line and return the exit code for it
pub fn print_outcome(outcome: &CheckOutcome) -> i32 {
    let mut stdout = io::stdout().lock();
    // A closed stdout leaves the exit code as the only signal
    let _ = writeln!(stdout, "{}", render_line(outcome));
    let _ = stdout.flush();
    outcome.state.exit_code()
}
