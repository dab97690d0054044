use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

const CAPACITY: usize = 500;
const PROMPT: &str = "Console$ : ";

#[derive(Debug, Clone)]
pub struct Console {
    lines: Arc<Mutex<VecDeque<String>>>,
    echo: bool,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(CAPACITY))),
            echo: false,
        }
    }

    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "pdfraster::console", "{line}");
        let mut lines = self.lock();
        if self.echo {
            println!("{PROMPT}{line}");
        }
        if lines.len() == CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// The most recent `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<String> {
        let lines = self.lock();
        let skip = lines.len().saturating_sub(count);
        lines.iter().skip(skip).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic while holding the lock cannot leave a half-written line.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

pub fn prompt() -> &'static str {
    PROMPT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn keeps_insertion_order() {
        let console = Console::new();
        console.push("one");
        console.push("two");
        assert_eq!(console.snapshot(), vec!["one", "two"]);
    }

    #[test]
    fn drops_oldest_past_capacity() {
        let console = Console::new();
        for i in 0..CAPACITY + 5 {
            console.push(format!("line {i}"));
        }
        let lines = console.snapshot();
        assert_eq!(lines.len(), CAPACITY);
        assert_eq!(lines[0], "line 5");
    }

    #[test]
    fn tail_returns_latest() {
        let console = Console::new();
        for i in 0..10 {
            console.push(i.to_string());
        }
        assert_eq!(console.tail(3), vec!["7", "8", "9"]);
        assert_eq!(console.tail(50).len(), 10);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let console = Console::new();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let console = console.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        console.push(format!("{worker}:{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let lines = console.snapshot();
        assert_eq!(lines.len(), 200);
        for worker in 0..4 {
            let own: Vec<_> = lines
                .iter()
                .filter(|line| line.starts_with(&format!("{worker}:")))
                .collect();
            assert_eq!(own.len(), 50);
            assert_eq!(own[49], &format!("{worker}:49"));
        }
    }
}
