//! Countdown state and the one-second tick that drives it.
//!
//! Nothing in here touches the gui or the audio output, the app feeds it
//! the current time and the text of the duration entry and acts on the
//! [`Tick`] outcomes it gets back.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;

pub const DEFAULT_TIMER_SECONDS: u32 = 30;
pub const MIN_TIMER_SECONDS: u32 = 1;
pub const MAX_TIMER_SECONDS: u32 = 3600;
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// the duration entry didn't hold a whole number of seconds in range
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Please enter a number between {min} and {max} seconds", min = MIN_TIMER_SECONDS, max = MAX_TIMER_SECONDS)]
pub struct DurationError {
    pub input: String,
}

/// parses the text of the duration entry
///
/// # Errors
/// if the text is not a base 10 integer in `MIN_TIMER_SECONDS..=MAX_TIMER_SECONDS`
pub fn validate_duration(text: &str) -> Result<u32, DurationError> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|seconds| (MIN_TIMER_SECONDS..=MAX_TIMER_SECONDS).contains(seconds))
        .ok_or_else(|| DurationError {
            input: text.to_string(),
        })
}

/// like [`validate_duration`] but falls back to [`DEFAULT_TIMER_SECONDS`],
/// handing back the error so it can still be shown
#[must_use]
pub fn duration_or_default(text: &str) -> (u32, Option<DurationError>) {
    match validate_duration(text) {
        Ok(seconds) => (seconds, None),
        Err(e) => (DEFAULT_TIMER_SECONDS, Some(e)),
    }
}

#[must_use]
pub fn format_remaining(remaining: u32) -> String {
    let minutes = remaining / 60;
    let seconds = remaining % 60;
    if minutes > 0 {
        format!("Time remaining: {minutes}:{seconds:02}")
    } else {
        format!("Time remaining: {seconds} seconds")
    }
}

/// a recurring deadline, armed on start and cancelled on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    interval: Duration,
    next: Option<Instant>,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(UPDATE_INTERVAL)
    }
}

impl Ticker {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    /// returns true (and schedules the following tick) if a tick is due at `now`
    ///
    /// the next deadline is based on the previous one and not on `now`
    /// so slow frames don't make the countdown drift
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now >= next => {
                self.next = Some(next + self.interval);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        self.next.map(|next| next.saturating_duration_since(now))
    }
}

/// what a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// the countdown isn't running
    Idle,
    Decremented,
    /// remaining time had reached zero, the alarm should ring and the
    /// countdown was reloaded, `error` is set if the duration entry was
    /// invalid at that point
    Alarm { error: Option<DurationError> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    running: bool,
    ticker: Ticker,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_TIMER_SECONDS)
    }
}

impl Countdown {
    #[must_use]
    pub const fn new(remaining: u32) -> Self {
        Self {
            remaining,
            running: false,
            ticker: Ticker::new(UPDATE_INTERVAL),
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// loads the duration from `text` and arms the tick
    ///
    /// # Errors
    /// if `text` is not a valid duration, the countdown still starts but
    /// with [`DEFAULT_TIMER_SECONDS`]
    pub fn start(&mut self, text: &str, now: Instant) -> Result<(), DurationError> {
        if self.running {
            return Ok(());
        }
        let (seconds, error) = duration_or_default(text);
        self.remaining = seconds;
        self.running = true;
        self.ticker.arm(now);
        log::info!("countdown started with {seconds} seconds");
        error.map_or(Ok(()), Err)
    }

    /// disarms the tick, remaining time is left as is
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.ticker.cancel();
        log::info!("countdown stopped with {} seconds left", self.remaining);
    }

    /// # Errors
    /// see [`Countdown::start`]
    pub fn toggle(&mut self, text: &str, now: Instant) -> Result<(), DurationError> {
        if self.running {
            self.stop();
            Ok(())
        } else {
            self.start(text, now)
        }
    }

    pub fn tick(&mut self, text: &str) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            Tick::Decremented
        } else {
            let (seconds, error) = duration_or_default(text);
            self.remaining = seconds;
            log::info!("countdown finished, reloading with {seconds} seconds");
            Tick::Alarm { error }
        }
    }

    /// runs every tick that has come due by `now`, one per elapsed interval
    pub fn poll(&mut self, now: Instant, text: &str) -> Vec<Tick> {
        let mut ticks = vec![];
        while self.running && self.ticker.due(now) {
            ticks.push(self.tick(text));
        }
        ticks
    }

    #[must_use]
    pub fn until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.ticker.until_next(now)
    }

    #[must_use]
    pub fn label(&self) -> String {
        format_remaining(self.remaining)
    }

    /// wall clock time the alarm will ring at if left running
    ///
    /// the alarm rings on the tick after remaining time reaches zero
    #[must_use]
    pub fn finishes_at(&self, now: Instant, wall: DateTime<Local>) -> Option<DateTime<Local>> {
        if !self.running {
            return None;
        }
        let wait = self.until_next_tick(now)? + self.ticker.interval * self.remaining;
        Some(wall + chrono::Duration::from_std(wait).ok()?)
    }
}
