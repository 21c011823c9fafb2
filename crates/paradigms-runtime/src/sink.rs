//! Example output sinks
//!
//! Examples report through an [`ExampleLogger`], called once per emitted line
//! in the order the example's draining loop receives values.

use std::sync::Arc;

use parking_lot::Mutex;

/// Receiver of the lines an example emits
pub trait ExampleLogger: Send + Sync {
    fn log(&self, line: &str);
}

/// Logger handle shared by every task of a running example
pub type SharedLogger = Arc<dyn ExampleLogger>;

/// Prints each line to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleLogger {
    prefix: Option<String>,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

impl ExampleLogger for ConsoleLogger {
    fn log(&self, line: &str) {
        match &self.prefix {
            Some(prefix) => println!("{} {}", prefix, line),
            None => println!("{}", line),
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl ExampleLogger for MemoryLogger {
    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_keeps_order() {
        let memory = MemoryLogger::new();
        let shared: SharedLogger = memory.clone();
        shared.log("first");
        shared.log("second");
        assert_eq!(memory.lines(), vec!["first", "second"]);

        memory.clear();
        assert!(memory.lines().is_empty());
    }
}
