use crate::game::note::Note;
use crate::game::timeline::Timeline;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("failed to read timeline {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed timeline line {line} ('{content}'): {reason}")]
    Malformed {
        line: usize,
        content: String,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Interval {
    count: u32,
    divisions: u32,
    line: usize,
}

fn malformed(line: usize, content: &str, reason: impl Into<String>) -> TimelineError {
    TimelineError::Malformed {
        line,
        content: content.to_string(),
        reason: reason.into(),
    }
}

#[inline(always)]
fn strip_comment(raw: &str) -> &str {
    match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// `+n/m`: emit n-1 clones of the anchor spread over n/m of the gap to the next note.
fn parse_interval(body: &str, line: usize, content: &str) -> Result<Interval, TimelineError> {
    let Some((n, m)) = body.split_once('/') else {
        return Err(malformed(line, content, "interval macro must look like +n/m"));
    };
    let count = n
        .trim()
        .parse::<u32>()
        .map_err(|e| malformed(line, content, format!("bad interval count: {e}")))?;
    let divisions = m
        .trim()
        .parse::<u32>()
        .map_err(|e| malformed(line, content, format!("bad interval divisor: {e}")))?;
    if count == 0 || divisions == 0 {
        return Err(malformed(line, content, "interval count and divisor must be positive"));
    }
    Ok(Interval {
        count,
        divisions,
        line,
    })
}

fn parse_note_line(body: &str, line: usize, content: &str) -> Result<Note, TimelineError> {
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(malformed(
            line,
            content,
            format!("expected 5 fields (time,duration,instrument,symbol,difficulty), got {}", fields.len()),
        ));
    }

    let time = fields[0]
        .parse::<f64>()
        .map_err(|e| malformed(line, content, format!("bad time: {e}")))?;
    if !time.is_finite() {
        return Err(malformed(line, content, "time must be finite"));
    }
    let duration = fields[1]
        .parse::<f64>()
        .map_err(|e| malformed(line, content, format!("bad duration: {e}")))?;
    if !duration.is_finite() {
        return Err(malformed(line, content, "duration must be finite"));
    }
    let instrument = fields[2];
    if instrument.is_empty() {
        return Err(malformed(line, content, "instrument is empty"));
    }
    let mut chars = fields[3].chars();
    let symbol = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(malformed(line, content, "symbol must be exactly one character")),
    };
    let difficulty = fields[4]
        .parse::<u32>()
        .map_err(|e| malformed(line, content, format!("bad difficulty: {e}")))?;

    Ok(Note::new(time, duration, instrument, symbol, difficulty))
}

/// Parses timeline text. Fails on the first malformed line; nothing is recovered.
pub fn parse(source: &str) -> Result<Timeline, TimelineError> {
    let mut notes: Vec<Note> = Vec::new();
    let mut anchor: Option<usize> = None;
    let mut pending: Option<Interval> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line = idx + 1;
        let body = strip_comment(raw_line).trim();
        if body.is_empty() {
            continue;
        }

        if let Some(rest) = body.strip_prefix('+') {
            if anchor.is_none() {
                return Err(malformed(line, raw_line, "interval macro without a preceding note"));
            }
            if pending.is_some() {
                return Err(malformed(line, raw_line, "consecutive interval macros"));
            }
            pending = Some(parse_interval(rest, line, raw_line)?);
            continue;
        }

        let note = parse_note_line(body, line, raw_line)?;
        if let (Some(interval), Some(anchor_idx)) = (pending.take(), anchor) {
            let a = notes[anchor_idx].clone();
            let step = (note.time - a.time) / f64::from(interval.divisions);
            for i in 1..interval.count {
                notes.push(a.clone_at(step.mul_add(f64::from(i), a.time)));
            }
        }
        notes.push(note);
        anchor = Some(notes.len() - 1);
    }

    if let Some(interval) = pending {
        return Err(TimelineError::Malformed {
            line: interval.line,
            content: format!("+{}/{}", interval.count, interval.divisions),
            reason: "interval macro without a following note".to_string(),
        });
    }

    Ok(Timeline::from_notes(notes))
}

pub fn load(path: &Path) -> Result<Timeline, TimelineError> {
    let source = std::fs::read_to_string(path).map_err(|source| TimelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&source)
}

#[cfg(test)]
mod tests {
    use super::{TimelineError, parse};

    #[test]
    fn interval_macro_expands_evenly_between_anchor_and_next() {
        let tl = parse("0,100,horn,a,0\n+4/4\n1000,50,drum,b,1\n").expect("valid timeline");
        let times: Vec<f64> = tl.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 250.0, 500.0, 750.0, 1000.0]);
        for synth in &tl.notes()[1..4] {
            assert_eq!(synth.instrument, "horn");
            assert_eq!(synth.duration, 100.0);
            assert_eq!(synth.symbol, 'a');
        }
        assert_eq!(tl.notes()[4].instrument, "drum");
    }

    #[test]
    fn interval_macro_with_wider_divisor_stops_short_of_next_note() {
        let tl = parse("0,0,horn,a,0\n+3/4\n1000,0,horn,a,0\n").expect("valid timeline");
        let times: Vec<f64> = tl.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 250.0, 500.0, 1000.0]);
    }

    #[test]
    fn expanded_notes_are_resorted_by_time() {
        let src = "0,0,horn,a,0\n+2/1\n1000,0,horn,b,0\n500,0,drum,c,0\n";
        let tl = parse(src).expect("valid timeline");
        let times: Vec<f64> = tl.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 500.0, 1000.0, 1000.0]);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let src = "# intro\n\n  100,10,horn,a,0   # first\n\n200,10,horn,s,2\n";
        let tl = parse(src).expect("valid timeline");
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.notes()[1].symbol, 's');
        assert_eq!(tl.notes()[1].difficulty, 2);
    }

    #[test]
    fn macro_without_anchor_is_rejected_with_line_number() {
        let err = parse("# header\n+4/4\n1000,0,horn,a,0\n").unwrap_err();
        match err {
            TimelineError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = parse("0,0,horn,a,0\n10,0,horn,a\n").unwrap_err();
        assert!(
            matches!(err, TimelineError::Malformed { line: 2, .. }),
            "expected line 2 to be reported, got {err:?}"
        );
    }

    #[test]
    fn multi_character_symbol_is_rejected() {
        let err = parse("0,0,horn,ab,0\n").unwrap_err();
        assert!(matches!(err, TimelineError::Malformed { line: 1, .. }));
    }

    #[test]
    fn trailing_macro_is_rejected() {
        let err = parse("0,0,horn,a,0\n+2/2\n").unwrap_err();
        assert!(matches!(err, TimelineError::Malformed { line: 2, .. }));
    }

    #[test]
    fn zero_interval_divisor_is_rejected() {
        let err = parse("0,0,horn,a,0\n+2/0\n10,0,horn,a,0\n").unwrap_err();
        assert!(matches!(err, TimelineError::Malformed { line: 2, .. }));
    }

    #[test]
    fn bundled_timeline_parses() {
        let tl = parse(include_str!("../../../assets/mountain_king.timeline")).expect("bundled timeline is valid");
        assert_eq!(tl.len(), 52);
        assert_eq!(tl.end_time(), 19_700.0);
        assert!(tl.notes().windows(2).all(|w| w[0].time <= w[1].time));
    }
}
