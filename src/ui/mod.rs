//! Output channel for commands
//!
//! Command results go to stdout, diagnostics to stderr. Progress and
//! request logging go through `tracing` instead.

use crate::error::Result;
use std::io::{self, Write};

#[cfg(test)]
pub mod test_ui;

pub trait UI {
    /// Print a result line
    fn output(&mut self, message: &str) -> Result<()>;

    fn error(&mut self, message: &str) -> Result<()>;

    fn warning(&mut self, message: &str) -> Result<()>;

    /// Print already formatted output, such as rendered reports
    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        io::stdout().write_all(bytes)?;
        Ok(())
    }
}

/// Terminal UI over stdout and stderr
pub struct CliUI {
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl CliUI {
    pub fn new() -> Self {
        CliUI {
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    /// Write to arbitrary sinks instead of the terminal
    pub fn with_writers(stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> Self {
        CliUI { stdout, stderr }
    }
}

impl Default for CliUI {
    fn default() -> Self {
        Self::new()
    }
}

impl UI for CliUI {
    fn output(&mut self, message: &str) -> Result<()> {
        writeln!(self.stdout, "{}", message)?;
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        writeln!(self.stderr, "{}", message)?;
        Ok(())
    }

    fn warning(&mut self, message: &str) -> Result<()> {
        writeln!(self.stderr, "Warning: {}", message)?;
        Ok(())
    }

    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdout.write_all(bytes)?;
        self.stdout.flush()?;
        Ok(())
    }
}
