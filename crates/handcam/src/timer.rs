//! Timing of pipeline stages and frame rate logging.

use std::{
    fmt,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::filter::{Ema, EmaState, Filter};

/// Smoothing factor of the averaged durations.
const EMA_ALPHA: f32 = 0.3;

/// Smoothed duration of a recurring operation.
///
/// Formatting a timer with `{}` prints the number of samples and their average since the last
/// time it was formatted, and starts over.
pub struct Timer {
    name: &'static str,
    ema: Ema,
    samples: Mutex<Samples>,
}

#[derive(Default)]
struct Samples {
    ema: EmaState,
    avg_secs: f32,
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(EMA_ALPHA),
            samples: Mutex::default(),
        }
    }

    /// Runs `op` and records how long it took.
    pub fn time<T>(&self, op: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        op()
    }

    /// Records the time until the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    fn samples(&self) -> MutexGuard<'_, Samples> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, elapsed: Duration) {
        let mut samples = self.samples();
        let avg = self.ema.filter(&mut samples.ema, elapsed.as_secs_f32());
        samples.avg_secs = avg;
        samples.count += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Samples {
            avg_secs, count, ..
        } = std::mem::take(&mut *self.samples());
        write!(f, "{}: {count}x{:.01}ms", self.name, avg_secs * 1000.0)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer({})", self.name)
    }
}

/// Returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts frames and logs the frame rate about once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    const INTERVAL: Duration = Duration::from_secs(1);

    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            since: Instant::now(),
        }
    }

    /// Counts a frame. When a log line is due, `extra` (usually [`Timer`]s) is appended to it.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.since.elapsed() < Self::INTERVAL {
            return;
        }

        let details = extra.into_iter().join(", ");
        match details.as_str() {
            "" => log::debug!("{}: {} FPS", self.name, self.frames),
            _ => log::debug!("{}: {} FPS ({details})", self.name, self.frames),
        }
        self.frames = 0;
        self.since = Instant::now();
    }
}
