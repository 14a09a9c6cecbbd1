//! Console output.

mod console;

pub use console::ConsoleReporter;
