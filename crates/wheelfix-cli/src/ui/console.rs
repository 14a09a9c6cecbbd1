//! Plain line-oriented reporter.
//!
//! One line per event, suitable for CI logs. Colors are applied only when
//! stdout is a terminal.

use std::io::IsTerminal;

use crossterm::style::Stylize;
use wheelfix_core::{Reporter, progress_line};

#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    quiet: bool,
    color: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            color: std::io::stdout().is_terminal(),
        }
    }

    fn paint(&self, text: &str, style: fn(&str) -> String) -> String {
        if self.color { style(text) } else { text.to_string() }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if !self.quiet {
            println!("{}", self.paint(&format!("==> {title}"), |s| s.bold().to_string()));
        }
    }

    fn progress(&self, done: usize, total: usize) {
        println!("{}", progress_line(done, total));
    }

    fn done(&self, wheel: &str, detail: &str) {
        if !self.quiet {
            println!(
                "{} {wheel} {}",
                self.paint("ok", |s| s.green().to_string()),
                self.paint(detail, |s| s.dark_grey().to_string())
            );
        }
    }

    fn failed(&self, wheel: &str, reason: &str) {
        println!(
            "{} {wheel}: {reason}",
            self.paint("error", |s| s.red().bold().to_string())
        );
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", self.paint("warning:", |s| s.yellow().to_string()));
    }

    fn summary(&self, text: &str) {
        print!("{text}");
    }
}
