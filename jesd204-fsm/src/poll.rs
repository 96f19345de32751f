//! # Bounded SYSREF Polling
//!
//! Some devices only reach a synchronized state after seeing a number of SYSREF pulses
//! (multichip synchronization being the usual example). The orchestrator never retries, so
//! adapters poll themselves; [`poll_with_sysref`] is the shared, always bounded implementation.
use std::{error::Error, fmt::Display, thread, time::Duration};

use crate::{HandlerError, OpContext};

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of status checks. Zero fails immediately.
    pub max_attempts: u32,
    /// Delay between a SYSREF pulse and the next status check.
    pub interval: Duration,
}

impl Config {
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: 255,
            interval: Duration::ZERO,
        }
    }
}

/// Builder to create a polling [Config]
///
/// # Example
///
/// ```
/// use jesd204_fsm::poll::Builder;
/// use std::time::Duration;
///
/// let config = Builder::new()
///     .max_attempts(16)
///     .interval(Duration::from_micros(100))
///     .build();
/// assert_eq!(config.max_attempts, 16);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the highest number of status checks before giving up.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the delay between a pulse and the following check
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[derive(Debug)]
pub enum PollError {
    /// The condition was not met within the configured number of attempts.
    Exhausted { attempts: u32 },
    /// The status check itself failed.
    Check(HandlerError),
    /// Requesting a SYSREF pulse failed.
    Sysref(HandlerError),
}

impl Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Exhausted { attempts } => {
                write!(f, "Condition not met after {} attempt(s)", attempts)
            }
            PollError::Check(err) => write!(f, "Status check failed: {}", err),
            PollError::Sysref(err) => write!(f, "{}", err),
        }
    }
}

impl Error for PollError {}

/// Calls `check` until it returns `true`, requesting a forced SYSREF pulse after every
/// unsuccessful check. Gives up after `config.max_attempts` checks.
///
/// Returns the number of checks performed.
pub fn poll_with_sysref(
    ctx: &OpContext<'_>,
    config: &Config,
    mut check: impl FnMut(u32) -> Result<bool, HandlerError>,
) -> Result<u32, PollError> {
    for attempt in 1..=config.max_attempts {
        if check(attempt).map_err(PollError::Check)? {
            log::debug!("{}: condition met after {} attempt(s)", ctx.name(), attempt);
            return Ok(attempt);
        }
        log::trace!("{}: attempt {} failed, requesting SYSREF", ctx.name(), attempt);
        ctx.sysref_async_force().map_err(PollError::Sysref)?;
        if !config.interval.is_zero() {
            thread::sleep(config.interval);
        }
    }
    log::error!(
        "{}: condition not met after {} attempt(s)",
        ctx.name(),
        config.max_attempts
    );
    Err(PollError::Exhausted {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use crate::{HandlerTable, Jesd204, Reason, State, TopologyEntry, error::Error as FsmError};

    use super::*;

    /// Runs a single per-device handler that polls until `ready_after` pulses were seen.
    fn run_poll(ready_after: u32, max_attempts: u32) -> (Result<(), FsmError>, u32, u32) {
        let pulses = Rc::new(Cell::new(0));
        let checks = Rc::new(Cell::new(0));
        let mut reg = Jesd204::new();

        let seen = Rc::clone(&pulses);
        let counted = Rc::clone(&checks);
        let xcvr = reg.register_device(
            "xcvr",
            HandlerTable::builder()
                .per_device(State::OptSetupStage1, move |ctx, _| {
                    let config = Builder::new().max_attempts(max_attempts).build();
                    poll_with_sysref(ctx, &config, |_| {
                        counted.set(counted.get() + 1);
                        Ok(seen.get() >= ready_after)
                    })?;
                    Ok(())
                })
                .build(),
        );
        let source = Rc::clone(&pulses);
        let clk = reg.register_device(
            "clk",
            HandlerTable::builder()
                .sysref(move || {
                    source.set(source.get() + 1);
                    Ok(())
                })
                .build(),
        );
        let topo = reg
            .init_topology([
                TopologyEntry::new(xcvr).top().links([0]),
                TopologyEntry::new(clk).sysref_provider(),
            ])
            .unwrap();
        let result = reg.run(topo, Reason::Init).map(|_| ());
        (result, checks.get(), pulses.get())
    }

    #[test]
    fn stops_when_condition_met() {
        let (result, checks, pulses) = run_poll(3, 255);
        assert!(result.is_ok());
        assert_eq!(checks, 4);
        // three polling pulses, then one post-state pulse
        assert_eq!(pulses, 4);
    }

    #[test]
    fn gives_up_after_bound() {
        let (result, checks, pulses) = run_poll(u32::MAX, 10);
        assert_eq!(checks, 10);
        assert_eq!(pulses, 10);
        match result {
            Err(FsmError::HandlerFailure(failure)) => {
                assert_eq!(failure.state, State::OptSetupStage1);
                assert_eq!(
                    failure.cause.to_string(),
                    "Condition not met after 10 attempt(s)"
                );
            }
            other => panic!("expected HandlerFailure, got {:?}", other),
        }
    }

    #[test]
    fn zero_attempts_fail_immediately() {
        let (result, checks, pulses) = run_poll(0, 0);
        assert!(result.is_err());
        assert_eq!(checks, 0);
        assert_eq!(pulses, 0);
    }

    #[test]
    fn default_bound() {
        assert_eq!(Config::default().max_attempts, 255);
        assert!(Config::default().interval.is_zero());
    }
}
