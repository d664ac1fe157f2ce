//! Printers: targets of the `print` statement.
//!
//! A cursor keeps a stack of open printers per frame; `PRINT` writes to the
//! innermost one, falling back to the runtime's default printer when none is
//! open.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Output sink for printed values.
pub trait Printer: Send {
    fn print(&mut self, text: &str);

    fn flush(&mut self) {}
}

/// Printer over a standard stream.
pub struct StandardPrinter {
    stderr: bool,
}

impl StandardPrinter {
    pub fn stdout() -> Self {
        Self { stderr: false }
    }

    pub fn stderr() -> Self {
        Self { stderr: true }
    }

    /// Printer for a numeric stream designator (1 = stdout, 2 = stderr).
    pub fn from_stream(stream: i64) -> Option<Self> {
        match stream {
            1 => Some(Self::stdout()),
            2 => Some(Self::stderr()),
            _ => None,
        }
    }
}

impl Printer for StandardPrinter {
    fn print(&mut self, text: &str) {
        if self.stderr {
            let _ = io::stderr().write_all(text.as_bytes());
        } else {
            let _ = io::stdout().write_all(text.as_bytes());
        }
    }

    fn flush(&mut self) {
        if self.stderr {
            let _ = io::stderr().flush();
        } else {
            let _ = io::stdout().flush();
        }
    }
}

/// Printer appending to a file.
pub struct FilePrinter {
    file: File,
}

impl FilePrinter {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl Printer for FilePrinter {
    fn print(&mut self, text: &str) {
        let _ = self.file.write_all(text.as_bytes());
    }

    fn flush(&mut self) {
        let _ = self.file.flush();
    }
}

/// Printer collecting into a shared buffer. Used by the REPL result echo
/// and by tests asserting program output.
#[derive(Clone, Default)]
pub struct BufferPrinter {
    buffer: Arc<Mutex<String>>,
}

impl BufferPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the collected text.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Printer for BufferPrinter {
    fn print(&mut self, text: &str) {
        self.buffer.lock().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_printer_accumulates() {
        let printer = BufferPrinter::new();
        let mut writer = printer.clone();
        writer.print("a");
        writer.print("b");
        assert_eq!(printer.contents(), "ab");
        printer.clear();
        assert_eq!(printer.contents(), "");
    }

    #[test]
    fn stream_designators() {
        assert!(StandardPrinter::from_stream(1).is_some());
        assert!(StandardPrinter::from_stream(2).is_some());
        assert!(StandardPrinter::from_stream(3).is_none());
    }
}
