// src/telemetry/breaker.rs
// Circuit breaker that disables telemetry after consecutive export failures.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Consecutive failures before telemetry emission is disabled.
const FAILURE_THRESHOLD: u32 = 5;

/// How long emission stays disabled before a probe is allowed.
const COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { tripped_at: Instant },
}

/// Tracks telemetry health so a broken exporter cannot cascade into the
/// operations it is supposed to observe.
#[derive(Debug)]
pub struct TelemetryBreaker {
    state: Mutex<State>,
}

impl TelemetryBreaker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Whether emission is currently allowed. An Open circuit past its
    /// cooldown admits the caller as a probe.
    pub fn is_enabled(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return true;
        };
        match &*state {
            State::Closed { .. } => true,
            State::Open { tripped_at } => {
                if tripped_at.elapsed() >= COOLDOWN {
                    *state = State::Closed {
                        consecutive_failures: FAILURE_THRESHOLD - 1,
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = State::Closed {
                consecutive_failures: 0,
            };
        }
    }

    pub fn record_failure(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match &mut *state {
            State::Closed {
                consecutive_failures,
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= FAILURE_THRESHOLD {
                    warn!(
                        failures = consecutive_failures,
                        "Telemetry circuit tripped, disabling emission for {}s",
                        COOLDOWN.as_secs()
                    );
                    *state = State::Open {
                        tripped_at: Instant::now(),
                    };
                }
            }
            State::Open { .. } => {}
        }
    }
}

impl Default for TelemetryBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_by_default() {
        let breaker = TelemetryBreaker::new();
        assert!(breaker.is_enabled());
    }

    #[test]
    fn test_trips_after_threshold() {
        let breaker = TelemetryBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure();
        }
        assert!(!breaker.is_enabled());
    }

    #[test]
    fn test_success_resets_counter() {
        let breaker = TelemetryBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            breaker.record_failure();
        }
        breaker.record_success();
        breaker.record_failure();
        assert!(breaker.is_enabled());
    }

    #[test]
    fn test_cooldown_reopens_for_probe() {
        let breaker = TelemetryBreaker::new();
        {
            let mut state = breaker.state.lock().unwrap();
            *state = State::Open {
                tripped_at: Instant::now() - COOLDOWN - Duration::from_secs(1),
            };
        }
        assert!(breaker.is_enabled());
        // One more failure re-trips immediately (probe failed)
        breaker.record_failure();
        assert!(!breaker.is_enabled());
    }
}
