//! UI that records everything a command prints

use crate::error::Result;
use crate::ui::UI;

#[derive(Debug, Default)]
pub struct TestUI {
    pub output: Vec<String>,
    pub errors: Vec<String>,
    pub bytes_output: Vec<u8>,
}

impl TestUI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed to stdout, lines and raw bytes
    pub fn stdout(&self) -> String {
        let mut text = self.output.join("\n");
        text.push_str(&String::from_utf8_lossy(&self.bytes_output));
        text
    }
}

impl UI for TestUI {
    fn output(&mut self, message: &str) -> Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn warning(&mut self, message: &str) -> Result<()> {
        self.errors.push(format!("Warning: {}", message));
        Ok(())
    }

    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes_output.extend_from_slice(bytes);
        Ok(())
    }
}
