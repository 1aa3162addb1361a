/// One musical event from a timeline file.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    /// Target time in milliseconds from the start of the backing track.
    pub time: f64,
    pub duration: f64,
    pub instrument: String,
    pub symbol: char,
    pub difficulty: u32,
}

impl Note {
    pub fn new(time: f64, duration: f64, instrument: &str, symbol: char, difficulty: u32) -> Self {
        Self {
            time,
            duration,
            instrument: instrument.to_string(),
            symbol,
            difficulty,
        }
    }

    /// Copy of this note moved to `time`, used by interval expansion.
    #[inline(always)]
    pub fn clone_at(&self, time: f64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}
