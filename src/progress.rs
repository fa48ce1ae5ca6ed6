//! Progress bar for long-running searches
//!
//! Renders a 50-character bar with a percentage on a single line,
//! rewritten in place between polls.

use std::io::Write;

fn clamp_progress(progress: i64) -> i64 {
    progress.clamp(0, 100)
}

/// Print the progress bar for a search. 100% appends a done marker and
/// moves on to a fresh line.
pub fn print_progress_bar(progress: i64) {
    let progress = clamp_progress(progress);
    let filled = (progress / 2) as usize;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(50 - filled));
    let mut stdout = std::io::stdout();
    if progress == 100 {
        let _ = write!(stdout, "\rProcessing... |{}| 100% ...done\n\n", bar);
    } else {
        let _ = write!(stdout, "\rProcessing... |{}| {}%", bar, progress);
    }
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped_to_valid_range() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(0), 0);
        assert_eq!(clamp_progress(42), 42);
        assert_eq!(clamp_progress(170), 100);
    }
}
