use log::{debug, info};

/* ============================== Public API ============================== */

/// The playback side gameplay depends on. Positions are milliseconds into the
/// backing track. A looping backend signals a completed pass by reporting a
/// position that jumps back toward zero (or goes negative).
pub trait AudioClock {
    fn play(&mut self, from_ms: i64);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn current_position_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Stopped,
    Playing,
    Paused,
}

/// Deterministic looping clock advanced by the host loop. Stands in for the
/// device clock in the headless runner and in tests.
#[derive(Clone, Debug)]
pub struct SimulatedClock {
    track_length_ms: i64,
    looping: bool,
    position_ms: f64,
    transport: Transport,
    loops_completed: u32,
}

impl SimulatedClock {
    pub fn new(track_length_ms: i64, looping: bool) -> Self {
        Self {
            track_length_ms: track_length_ms.max(1),
            looping,
            position_ms: 0.0,
            transport: Transport::Stopped,
            loops_completed: 0,
        }
    }

    #[inline(always)]
    pub const fn track_length_ms(&self) -> i64 {
        self.track_length_ms
    }

    #[inline(always)]
    pub const fn loops_completed(&self) -> u32 {
        self.loops_completed
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    /// Advances the transport by one host frame.
    pub fn advance(&mut self, delta_ms: f64) {
        if self.transport != Transport::Playing || !delta_ms.is_finite() || delta_ms <= 0.0 {
            return;
        }
        self.position_ms += delta_ms;
        let length = self.track_length_ms as f64;
        if self.position_ms >= length {
            if self.looping {
                // A stalled frame can span several passes.
                let passes = (self.position_ms / length).floor();
                self.position_ms = self.position_ms.rem_euclid(length);
                self.loops_completed += passes as u32;
                debug!("Simulated track looped ({} passes).", self.loops_completed);
            } else {
                self.position_ms = length;
                self.transport = Transport::Stopped;
                info!("Simulated track reached its end.");
            }
        }
    }
}

impl AudioClock for SimulatedClock {
    fn play(&mut self, from_ms: i64) {
        self.position_ms = from_ms.clamp(0, self.track_length_ms) as f64;
        self.transport = Transport::Playing;
    }

    fn pause(&mut self) {
        if self.transport == Transport::Playing {
            self.transport = Transport::Paused;
        }
    }

    fn resume(&mut self) {
        if self.transport == Transport::Paused {
            self.transport = Transport::Playing;
        }
    }

    fn stop(&mut self) {
        self.transport = Transport::Stopped;
        self.position_ms = 0.0;
    }

    fn current_position_ms(&self) -> i64 {
        self.position_ms.floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioClock, SimulatedClock};

    #[test]
    fn looping_clock_wraps_back_toward_zero() {
        let mut clock = SimulatedClock::new(1000, true);
        clock.play(0);
        clock.advance(990.0);
        assert_eq!(clock.current_position_ms(), 990);
        clock.advance(20.0);
        assert_eq!(clock.current_position_ms(), 10);
        assert_eq!(clock.loops_completed(), 1);
    }

    #[test]
    fn long_stall_lands_inside_the_track() {
        let mut clock = SimulatedClock::new(1000, true);
        clock.play(900);
        clock.advance(2350.0);
        assert_eq!(clock.current_position_ms(), 250);
        assert_eq!(clock.loops_completed(), 3);
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = SimulatedClock::new(1000, false);
        clock.play(100);
        clock.pause();
        clock.advance(500.0);
        assert_eq!(clock.current_position_ms(), 100);
        clock.resume();
        clock.advance(50.0);
        assert_eq!(clock.current_position_ms(), 150);
    }

    #[test]
    fn non_looping_clock_stops_at_end() {
        let mut clock = SimulatedClock::new(300, false);
        clock.play(0);
        clock.advance(500.0);
        assert_eq!(clock.current_position_ms(), 300);
        assert!(!clock.is_playing());
    }
}
