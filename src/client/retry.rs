use std::thread;
use std::time::Duration;

use tracing::debug;

/// Bounded retry schedule: one attempt per entry, each preceded by its delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// 3 attempts at 0, 200 and 400 ms.
    fn default() -> Self {
        Self::from_millis(&[0, 200, 400])
    }
}

impl RetryPolicy {
    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self {
            delays: delays_ms.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Run `attempt` until `accept` likes its output or the schedule runs out.
    /// Returns the last output seen (if any attempt ran) and how many attempts
    /// were made.
    pub fn run<T>(
        &self,
        mut attempt: impl FnMut(usize) -> T,
        accept: impl Fn(&T) -> bool,
    ) -> (Option<T>, usize) {
        let mut last = None;
        for (n, delay) in self.delays.iter().enumerate() {
            if !delay.is_zero() {
                thread::sleep(*delay);
            }
            let out = attempt(n);
            if accept(&out) {
                return (Some(out), n + 1);
            }
            debug!(attempt = n + 1, of = self.delays.len(), "retrying");
            last = Some(out);
        }
        (last, self.delays.len())
    }
}
