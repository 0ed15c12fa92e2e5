//! Per-phase timing lines, enabled by `-t`.

use std::time::Instant;

/// Logs elapsed time and peak memory per phase to stderr.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    enabled: bool,
}

impl PhaseTimer {
    /// Create a timer; a disabled timer logs nothing.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Start a phase.
    #[inline]
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Log time elapsed since `start` and the process's peak RSS.
    pub fn log_since(&self, start: Instant, what: &str) {
        if !self.enabled {
            return;
        }
        let seconds = start.elapsed().as_secs_f64();
        eprintln!(
            "{} took {:.6} seconds.\tPeak used {}KB.",
            what,
            seconds,
            peak_rss_kb()
        );
    }
}

/// Peak resident set size in kilobytes, from `getrusage`.
fn peak_rss_kb() -> i64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return 0;
    }
    // ru_maxrss is kilobytes on Linux, bytes on some BSDs; kilobytes is
    // the platform this driver targets.
    usage.ru_maxrss
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_rss_is_positive() {
        assert!(peak_rss_kb() > 0);
    }

    #[test]
    fn test_disabled_timer_is_silent() {
        // Just exercises the no-op path.
        let timer = PhaseTimer::new(false);
        let start = timer.start();
        timer.log_since(start, "nothing");
    }
}
