use crate::cancel::CancelToken;
use crate::CoreError;
use berth_host::{CommandRunner, CommandSpec, ContainerEngine};
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 30;
pub const DEFAULT_INTERVAL_SECS: u64 = 2;

/// Granularity at which a cancellable sleep checks its token.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// What a single inspect call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRunState {
    Running,
    NotRunning,
    /// Inspect failed: container missing, engine unreachable, or unexpected
    /// output.
    Indeterminate,
}

/// Ask the engine whether `container` is running.
pub fn inspect_running(
    runner: &dyn CommandRunner,
    engine: ContainerEngine,
    container: &str,
) -> ContainerRunState {
    let command = CommandSpec::new(engine.binary()).args([
        "container",
        "inspect",
        "-f",
        "{{.State.Running}}",
        container,
    ]);
    match runner.run(&command) {
        Ok(out) if out.success => match out.stdout_text().trim() {
            "true" => ContainerRunState::Running,
            "false" => ContainerRunState::NotRunning,
            other => {
                tracing::debug!("unexpected inspect output for {container}: '{other}'");
                ContainerRunState::Indeterminate
            }
        },
        Ok(out) => {
            tracing::debug!(
                "inspect {container}: {}: {}",
                out.status_description(),
                out.output_tail()
            );
            ContainerRunState::Indeterminate
        }
        Err(e) => {
            tracing::debug!("inspect {container}: {e}");
            ContainerRunState::Indeterminate
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread. When built with a token, the sleep wakes early
/// once the token is cancelled.
#[derive(Debug, Default, Clone)]
pub struct ThreadSleeper {
    cancel: Option<CancelToken>,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancellable(token: CancelToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        let Some(token) = &self.cancel else {
            std::thread::sleep(duration);
            return;
        };
        let mut remaining = duration;
        while !remaining.is_zero() && !token.is_cancelled() {
            let slice = remaining.min(CANCEL_POLL);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Polling { attempt: u32 },
    Succeeded { attempts: u32 },
    TimedOut { attempts: u32 },
}

/// Polls a container until it reports running, with a fixed interval and a
/// bounded number of attempts.
pub struct ReadinessWaiter<'a> {
    runner: &'a dyn CommandRunner,
    sleeper: &'a dyn Sleeper,
    attempts: u32,
    interval: Duration,
    cancel: Option<CancelToken>,
}

impl<'a> ReadinessWaiter<'a> {
    pub fn new(runner: &'a dyn CommandRunner, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            runner,
            sleeper,
            attempts: DEFAULT_ATTEMPTS,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Total time the waiter may spend sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Wait for `container`; returns the attempt on which it was seen running.
    pub fn wait(&self, engine: ContainerEngine, container: &str) -> Result<u32, CoreError> {
        self.wait_with(engine, container, |_, _| {})
    }

    /// Like `wait`, reporting every observation to `observe`.
    pub fn wait_with(
        &self,
        engine: ContainerEngine,
        container: &str,
        mut observe: impl FnMut(u32, ContainerRunState),
    ) -> Result<u32, CoreError> {
        let mut state = WaitState::Polling { attempt: 1 };
        loop {
            state = match state {
                WaitState::Polling { attempt } => {
                    if self.cancelled() {
                        return Err(CoreError::Cancelled(container.to_owned()));
                    }
                    let observed = inspect_running(self.runner, engine, container);
                    tracing::debug!(
                        "{container}: attempt {attempt}/{}: {observed:?}",
                        self.attempts
                    );
                    observe(attempt, observed);

                    if observed == ContainerRunState::Running {
                        WaitState::Succeeded { attempts: attempt }
                    } else {
                        self.sleeper.sleep(self.interval);
                        if self.cancelled() {
                            return Err(CoreError::Cancelled(container.to_owned()));
                        }
                        if attempt >= self.attempts {
                            WaitState::TimedOut { attempts: attempt }
                        } else {
                            WaitState::Polling {
                                attempt: attempt + 1,
                            }
                        }
                    }
                }
                WaitState::Succeeded { attempts } => {
                    tracing::info!("{container} is running");
                    return Ok(attempts);
                }
                WaitState::TimedOut { attempts } => {
                    return Err(CoreError::ReadinessTimeout {
                        container: container.to_owned(),
                        attempts,
                        seconds: self.budget().as_secs(),
                    });
                }
            };
        }
    }
}
