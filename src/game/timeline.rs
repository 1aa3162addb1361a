use crate::game::note::Note;

/// Time-ordered note list for one song. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    notes: Vec<Note>,
}

impl Timeline {
    /// Sorts by time; the sort is stable so same-time notes keep file order.
    pub fn from_notes(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { notes }
    }

    #[cfg(test)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Last note time, used as the nominal run length when the clock has none.
    pub fn end_time(&self) -> f64 {
        self.notes.last().map_or(0.0, |n| n.time + n.duration.max(0.0))
    }

    /// Notes whose instrument is in `instruments` and whose difficulty is at
    /// most `max_difficulty`, ascending by time. Calling it again restarts.
    pub fn filtered<'a, S: AsRef<str>>(
        &'a self,
        instruments: &'a [S],
        max_difficulty: u32,
    ) -> impl Iterator<Item = &'a Note> + Clone + 'a {
        self.notes.iter().filter(move |note| {
            note.difficulty <= max_difficulty
                && instruments.iter().any(|i| i.as_ref() == note.instrument)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Timeline;
    use crate::game::note::Note;

    fn sample() -> Timeline {
        Timeline::from_notes(vec![
            Note::new(900.0, 0.0, "drum", 'j', 1),
            Note::new(100.0, 0.0, "horn", 'a', 0),
            Note::new(500.0, 0.0, "horn", 's', 2),
            Note::new(300.0, 0.0, "flute", 'd', 0),
            Note::new(700.0, 0.0, "horn", 'f', 1),
        ])
    }

    #[test]
    fn construction_sorts_by_time() {
        let tl = sample();
        assert!(tl.notes().windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn filtered_respects_instrument_and_difficulty() {
        let tl = sample();
        let instruments = ["horn".to_string(), "drum".to_string()];
        let picked: Vec<&Note> = tl.filtered(&instruments, 1).collect();
        let times: Vec<f64> = picked.iter().map(|n| n.time).collect();
        assert_eq!(times, vec![100.0, 700.0, 900.0]);
        assert!(picked.iter().all(|n| n.difficulty <= 1));
        assert!(picked.iter().all(|n| n.instrument == "horn" || n.instrument == "drum"));
    }

    #[test]
    fn filtered_is_restartable_and_does_not_mutate() {
        let tl = sample();
        let instruments = ["horn"];
        let iter = tl.filtered(&instruments, 5);
        let first: Vec<f64> = iter.clone().map(|n| n.time).collect();
        let second: Vec<f64> = iter.map(|n| n.time).collect();
        let third: Vec<f64> = tl.filtered(&instruments, 5).map(|n| n.time).collect();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(tl.len(), 5);
    }

    #[test]
    fn filtered_with_unknown_instrument_is_empty() {
        let tl = sample();
        assert_eq!(tl.filtered(&["tuba"], 10).count(), 0);
    }
}
