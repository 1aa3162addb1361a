use log::debug;

// ------------------ Timing Windows (Gameplay + Visuals) ------------------
// All windows are in milliseconds around the target time.
pub const DEFAULT_WINDOW_BEFORE_MS: f64 = 150.0;
pub const DEFAULT_WINDOW_AFTER_MS: f64 = 250.0;

// A backwards jump of the playback position larger than this means the track
// looped; anything smaller is treated as device jitter and ignored.
pub const WRAP_TOLERANCE_MS: i64 = 250;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingWindows {
    /// Early tolerance.
    pub before_ms: f64,
    /// Late tolerance.
    pub after_ms: f64,
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self {
            before_ms: DEFAULT_WINDOW_BEFORE_MS,
            after_ms: DEFAULT_WINDOW_AFTER_MS,
        }
    }
}

impl TimingWindows {
    pub fn new(before_ms: f64, after_ms: f64) -> Self {
        Self {
            before_ms: before_ms.max(0.0),
            after_ms: after_ms.max(0.0),
        }
    }

    /// `offset_ms` is press time minus target time. The bound used depends
    /// on its sign, and both bounds are exclusive.
    #[inline(always)]
    pub fn accepts(&self, offset_ms: f64) -> bool {
        let bound = if offset_ms < 0.0 {
            self.before_ms
        } else {
            self.after_ms
        };
        offset_ms.abs() < bound
    }

    #[inline(always)]
    pub fn opens_at(&self, target_ms: f64) -> f64 {
        target_ms - self.before_ms
    }

    #[inline(always)]
    pub fn closes_at(&self, target_ms: f64) -> f64 {
        target_ms + self.after_ms
    }
}

/* ------------------------------ Run Clock ------------------------------ */

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClockSample {
    Position(f64),
    /// The backing track wrapped. Carries the length of the run that just ended.
    Wrapped { completed_run_ms: f64 },
}

/// Derives the music position from the playback clock:
/// `previous_run_offset + raw + static_offset + gap_offset`.
/// Non-decreasing for the whole session; a wrap freezes the finished run
/// into `previous_run_offset`.
#[derive(Clone, Debug)]
pub struct RunClock {
    static_offset_ms: f64,
    previous_run_offset_ms: f64,
    gap_offset_ms: f64,
    last_raw_ms: i64,
    music_ms: f64,
}

impl RunClock {
    pub fn new(static_offset_ms: f64) -> Self {
        Self {
            static_offset_ms,
            previous_run_offset_ms: 0.0,
            gap_offset_ms: 0.0,
            last_raw_ms: 0,
            music_ms: static_offset_ms,
        }
    }

    #[inline(always)]
    pub const fn music_ms(&self) -> f64 {
        self.music_ms
    }

    #[cfg(test)]
    #[inline(always)]
    pub const fn previous_run_offset_ms(&self) -> f64 {
        self.previous_run_offset_ms
    }

    /// Music time at which note time zero of the current run lands.
    #[inline(always)]
    pub fn run_base_ms(&self) -> f64 {
        self.previous_run_offset_ms + self.static_offset_ms
    }

    #[inline(always)]
    fn recompute(&mut self, raw_ms: i64) {
        self.music_ms =
            self.previous_run_offset_ms + raw_ms as f64 + self.static_offset_ms + self.gap_offset_ms;
    }

    pub fn observe(&mut self, raw_ms: i64) -> ClockSample {
        let wrapped = raw_ms < 0 || self.last_raw_ms - raw_ms > WRAP_TOLERANCE_MS;
        if wrapped {
            let completed_run_ms = self.last_raw_ms.max(0) as f64;
            self.previous_run_offset_ms += completed_run_ms;
            self.last_raw_ms = 0;
            self.gap_offset_ms = 0.0;
            self.recompute(0);
            debug!(
                "Run wrapped after {completed_run_ms:.0}ms (raw={raw_ms}); previous run offset now {:.0}ms",
                self.previous_run_offset_ms
            );
            return ClockSample::Wrapped { completed_run_ms };
        }
        // Small backwards jitter never moves the music position backwards.
        let raw_ms = raw_ms.max(self.last_raw_ms);
        self.last_raw_ms = raw_ms;
        self.recompute(raw_ms);
        ClockSample::Position(self.music_ms)
    }

    /// While the track is silent between runs, time keeps flowing through the gap offset.
    pub fn set_gap_elapsed(&mut self, elapsed_ms: f64) {
        self.gap_offset_ms = elapsed_ms.max(self.gap_offset_ms);
        self.recompute(0);
    }

    /// Folds the finished gap into the previous-run offset before the track restarts.
    pub fn finish_gap(&mut self, gap_ms: f64) {
        self.previous_run_offset_ms += gap_ms;
        self.gap_offset_ms = 0.0;
        self.last_raw_ms = 0;
        self.recompute(0);
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.static_offset_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockSample, RunClock, TimingWindows};

    #[test]
    fn windows_are_asymmetric_and_exclusive() {
        let w = TimingWindows::new(150.0, 250.0);
        assert!(w.accepts(-149.9));
        assert!(!w.accepts(-150.0));
        assert!(!w.accepts(-200.0));
        assert!(w.accepts(0.0));
        assert!(w.accepts(200.0));
        assert!(w.accepts(249.9));
        assert!(!w.accepts(250.0));
    }

    #[test]
    fn zero_windows_accept_nothing() {
        let w = TimingWindows::new(0.0, 0.0);
        assert!(!w.accepts(0.0));
        assert!(!w.accepts(-0.1));
    }

    #[test]
    fn music_position_includes_static_offset() {
        let mut clock = RunClock::new(20.0);
        assert_eq!(clock.observe(100), ClockSample::Position(120.0));
        assert_eq!(clock.observe(500), ClockSample::Position(520.0));
    }

    #[test]
    fn small_backwards_jitter_is_ignored() {
        let mut clock = RunClock::new(0.0);
        clock.observe(1000);
        assert_eq!(clock.observe(990), ClockSample::Position(1000.0));
        assert_eq!(clock.observe(1010), ClockSample::Position(1010.0));
    }

    #[test]
    fn wrap_folds_run_into_offset_and_stays_monotonic() {
        let mut clock = RunClock::new(0.0);
        clock.observe(9_000);
        clock.observe(9_950);
        let before = clock.music_ms();
        assert_eq!(
            clock.observe(30),
            ClockSample::Wrapped {
                completed_run_ms: 9_950.0
            }
        );
        assert_eq!(clock.previous_run_offset_ms(), 9_950.0);
        assert!(clock.music_ms() >= before);

        clock.set_gap_elapsed(1_000.0);
        assert_eq!(clock.music_ms(), 10_950.0);
        clock.finish_gap(2_000.0);
        assert_eq!(clock.music_ms(), 11_950.0);
        assert_eq!(clock.run_base_ms(), 11_950.0);
        assert_eq!(clock.observe(100), ClockSample::Position(12_050.0));
    }

    #[test]
    fn negative_raw_position_signals_wrap() {
        let mut clock = RunClock::new(0.0);
        clock.observe(100);
        assert!(matches!(clock.observe(-1), ClockSample::Wrapped { .. }));
    }
}
