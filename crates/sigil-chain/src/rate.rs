use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-wide minimum-interval gate for external RPC endpoints.
///
/// Each endpoint gets an independent slot; a call arriving before the
/// interval has elapsed sleeps the excess on the calling thread.
pub struct RateGate {
    min_interval: Duration,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Block until a call to `endpoint` is allowed, then record it.
    pub fn wait(&self, endpoint: &str) {
        let sleep_for = {
            let mut last = self.last_call.lock().expect("rate gate lock poisoned");
            let now = Instant::now();
            let sleep_for = last
                .get(endpoint)
                .and_then(|prev| self.min_interval.checked_sub(now.duration_since(*prev)))
                .unwrap_or(Duration::ZERO);
            // Record the slot as (now + sleep) so concurrent callers queue
            // behind this one instead of sleeping the same excess.
            last.insert(endpoint.to_string(), now + sleep_for);
            sleep_for
        };
        if !sleep_for.is_zero() {
            std::thread::sleep(sleep_for);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_call_waits_out_the_interval() {
        let gate = RateGate::new(Duration::from_millis(50));
        let start = Instant::now();
        gate.wait("http://chain");
        gate.wait("http://chain");
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn distinct_endpoints_do_not_contend() {
        let gate = RateGate::new(Duration::from_millis(200));
        let start = Instant::now();
        gate.wait("http://a");
        gate.wait("http://b");
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
