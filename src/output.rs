//! User-facing console output.
//! Colored prefixes when stdout is a TTY, plain text otherwise, so scripted
//! callers can grep the summary lines.

use owo_colors::OwoColorize;

use crate::engine::RunSummary;

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print a plain line (no prefix).
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// One-line totals, e.g. `changes=3 warnings=0 dirs_removed=1 ownership_applied=0`.
pub fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "changes={} warnings={} dirs_removed={} ownership_applied={}",
        summary.changes, summary.warnings, summary.dirs_removed, summary.ownership_applied
    );
    if summary.malformed > 0 {
        line.push_str(&format!(" malformed={}", summary.malformed));
    }
    if summary.dry_run {
        line.push_str(" (dry-run)");
    }
    if summary.interrupted {
        line.push_str(" (interrupted)");
    }
    line
}

/// Print the end-of-run summary: per-bucket counts, then the totals line.
pub fn print_summary(summary: &RunSummary) {
    let buckets: Vec<String> = summary
        .buckets
        .iter()
        .map(|(bucket, n)| format!("{bucket}={n}"))
        .collect();
    print_info(&format!("buckets: {}", buckets.join(" ")));

    let dropped: Vec<String> = summary
        .dropped
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(reason, n)| format!("{}={n}", reason.as_str()))
        .collect();
    if !dropped.is_empty() {
        print_info(&format!("ignored: {}", dropped.join(" ")));
    }

    let line = summary_line(summary);
    if summary.warnings > 0 || summary.interrupted {
        print_warn(&line);
    } else {
        print_success(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_flags() {
        let mut s = RunSummary {
            changes: 2,
            warnings: 1,
            dirs_removed: 1,
            ..Default::default()
        };
        assert_eq!(summary_line(&s), "changes=2 warnings=1 dirs_removed=1 ownership_applied=0");
        s.dry_run = true;
        s.malformed = 1;
        assert!(summary_line(&s).ends_with("malformed=1 (dry-run)"));
    }
}
