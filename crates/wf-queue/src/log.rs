//! Accumulated, user-visible text log of one batch.

use chrono::Local;
use parking_lot::Mutex;

/// Append-only log shared by the dispatcher and the workers.
#[derive(Debug, Default)]
pub struct BatchLog {
    lines: Mutex<Vec<String>>,
}

impl BatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, prefixed with the local wall-clock time.
    pub fn append(&self, message: impl AsRef<str>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());
        self.lines.lock().push(line);
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Every line, newline-terminated.
    pub fn text(&self) -> String {
        let lines = self.lines.lock();
        let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_render() {
        let log = BatchLog::new();
        assert!(log.is_empty());
        log.append("queue paused");
        log.append(String::from("queue resumed"));
        assert_eq!(log.len(), 2);

        let text = log.text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("] queue paused"));
        assert!(lines[1].ends_with("] queue resumed"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn clear_empties() {
        let log = BatchLog::new();
        log.append("x");
        log.clear();
        assert_eq!(log.text(), "");
    }
}
