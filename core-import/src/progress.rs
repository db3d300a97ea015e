//! # Progress Simulator
//!
//! Drives a progress value from 0 to 100 on a fixed tick.
//!
//! [`ProgressTicker`] holds the arithmetic and is fully deterministic.
//! [`ProgressSimulator`] schedules it on a `tokio::time::interval` and stops
//! early when its cancellation token fires.
//!
//! ```rust
//! use core_import::progress::ProgressTicker;
//!
//! let mut ticker = ProgressTicker::new(25);
//! let values: Vec<u8> = std::iter::from_fn(|| ticker.tick().map(|t| t.value)).collect();
//! assert_eq!(values, vec![25, 50, 75, 100]);
//! ```

use crate::{ImportError, Result};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Tick schedule for simulated progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Delay between ticks
    pub tick: Duration,
    /// Increment per tick (1..=100)
    pub step: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(30),
            step: 2,
        }
    }
}

impl ProgressConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 || self.step > 100 {
            return Err(ImportError::Config(format!(
                "progress step must be between 1 and 100, got {}",
                self.step
            )));
        }
        if self.tick.is_zero() {
            return Err(ImportError::Config(
                "progress tick must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of ticks needed to reach 100.
    pub fn expected_ticks(&self) -> u32 {
        let step = u32::from(self.step.max(1));
        100u32.div_ceil(step)
    }

    /// Wall time needed to reach 100.
    pub fn expected_duration(&self) -> Duration {
        self.tick * self.expected_ticks()
    }
}

/// One emitted progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub value: u8,
    /// Set on the single tick that reaches 100
    pub completed: bool,
}

/// Deterministic progress counter.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    step: u8,
    value: u8,
    completed: bool,
}

impl ProgressTicker {
    pub fn new(step: u8) -> Self {
        Self {
            step: step.max(1),
            value: 0,
            completed: false,
        }
    }

    /// Reset to 0.
    pub fn start(&mut self) {
        self.value = 0;
        self.completed = false;
    }

    /// Advance by one step. Returns `None` once 100 has been reported.
    pub fn tick(&mut self) -> Option<ProgressTick> {
        if self.completed {
            return None;
        }
        self.value = self.value.saturating_add(self.step).min(100);
        self.completed = self.value == 100;
        Some(ProgressTick {
            value: self.value,
            completed: self.completed,
        })
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

/// How a simulated run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    Completed,
    Cancelled,
}

/// Timer-driven progress source.
#[derive(Debug, Clone)]
pub struct ProgressSimulator {
    config: ProgressConfig,
}

impl ProgressSimulator {
    pub fn new(config: ProgressConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    /// Run from 0 to 100, invoking `on_tick` after every tick.
    ///
    /// The first value is produced one tick after the call.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_tick: F) -> ProgressOutcome
    where
        F: FnMut(ProgressTick),
    {
        let mut ticker = ProgressTicker::new(self.config.step);
        ticker.start();
        let mut interval = interval_at(Instant::now() + self.config.tick, self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ProgressOutcome::Cancelled,
                _ = interval.tick() => {
                    match ticker.tick() {
                        Some(tick) => {
                            on_tick(tick);
                            if tick.completed {
                                return ProgressOutcome::Completed;
                            }
                        }
                        None => return ProgressOutcome::Completed,
                    }
                }
            }
        }
    }

    /// The same schedule as a stream of values, ending after 100.
    pub fn ticks(&self) -> BoxStream<'static, u8> {
        let mut ticker = ProgressTicker::new(self.config.step);
        ticker.start();
        let mut interval = interval_at(Instant::now() + self.config.tick, self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        stream::unfold((ticker, interval), |(mut ticker, mut interval)| async move {
            let tick = ticker.tick()?;
            interval.tick().await;
            Some((tick.value, (ticker, interval)))
        })
        .boxed()
    }
}
