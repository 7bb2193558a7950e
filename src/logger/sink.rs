//! Output targets for formatted lines

use parking_lot::Mutex;

use super::Level;

/// Destination for formatted lines
pub trait Sink: Send + Sync {
    fn write(&self, level: Level, line: &str);

    /// Whether lines written here may carry ANSI styling
    fn colors(&self) -> bool {
        false
    }
}

/// Writes to the terminal: warnings and errors to stderr, the rest to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for ConsoleSink {
    fn write(&self, level: Level, line: &str) {
        if level >= Level::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn colors(&self) -> bool {
        console::colors_enabled()
    }
}

/// A written line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub line: String,
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Just the text of every line, in order
    pub fn text(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.line.clone()).collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Sink for MemorySink {
    fn write(&self, level: Level, line: &str) {
        self.records.lock().push(Record {
            level,
            line: line.to_string(),
        });
    }
}
