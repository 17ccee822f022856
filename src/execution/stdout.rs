//! Captured stdout for an execution session
//!
//! A bounded line buffer shared between the engine, script `print`/`debug`
//! hooks and native callables. When full, the oldest lines are dropped first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    lines: VecDeque<String>,
    /// Text written without a trailing newline yet
    partial: String,
    dropped: usize,
}

/// Cheaply cloneable handle to a bounded line buffer
#[derive(Debug, Clone)]
pub struct StdoutBuffer {
    inner: Arc<Mutex<Inner>>,
    max_lines: usize,
}

impl StdoutBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_lines: max_lines.max(1),
        }
    }

    /// Append raw text, splitting it into lines
    pub fn write(&self, text: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let mut rest = text;
        while let Some(pos) = rest.find('\n') {
            let mut line = std::mem::take(&mut inner.partial);
            line.push_str(&rest[..pos]);
            self.push_line(&mut inner, line);
            rest = &rest[pos + 1..];
        }
        inner.partial.push_str(rest);
    }

    /// Append a full line
    pub fn println(&self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    fn push_line(&self, inner: &mut Inner, line: String) {
        if inner.lines.len() >= self.max_lines {
            inner.lines.pop_front();
            inner.dropped += 1;
        }
        inner.lines.push_back(line);
    }

    /// Move any unterminated text into its own line
    pub fn flush(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.partial.is_empty() {
                let line = std::mem::take(&mut inner.partial);
                self.push_line(&mut inner, line);
            }
        }
    }

    /// Snapshot of the retained lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of lines discarded to respect the bound
    pub fn dropped(&self) -> usize {
        self.inner.lock().map(|inner| inner.dropped).unwrap_or(0)
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_lines() {
        let buffer = StdoutBuffer::new(2);
        buffer.println("one");
        buffer.println("two");
        buffer.println("three");
        assert_eq!(buffer.lines(), vec!["two", "three"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_partial_lines_join() {
        let buffer = StdoutBuffer::new(10);
        buffer.write("a");
        buffer.write("b\nc");
        assert_eq!(buffer.lines(), vec!["ab"]);
        buffer.flush();
        assert_eq!(buffer.lines(), vec!["ab", "c"]);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = StdoutBuffer::new(10);
        let handle = buffer.clone();
        handle.println("shared");
        assert_eq!(buffer.lines(), vec!["shared"]);
    }
}
