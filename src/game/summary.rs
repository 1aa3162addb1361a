use crate::game::judgment::{JudgeKind, Judgment};
use chrono::Local;
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Offset statistics over accepted presses. Misses carry no meaningful offset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingStats {
    pub mean_ms: f64,
    pub mean_abs_ms: f64,
    pub max_abs_ms: f64,
    pub count: u32,
}

/// Running judgment counters for one session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub hits: u32,
    pub misses: u32,
    pub miss_presses: u32,
    pub streak: u32,
    pub best_streak: u32,
    #[serde(skip)]
    error_sum_ms: f64,
    #[serde(skip)]
    abs_error_sum_ms: f64,
    #[serde(skip)]
    max_abs_error_ms: f64,
}

impl SessionStats {
    pub fn record(&mut self, judgment: &Judgment) {
        match judgment.kind {
            JudgeKind::Hit => {
                self.hits += 1;
                self.streak += 1;
                self.best_streak = self.best_streak.max(self.streak);
                let e = judgment.time_error_ms;
                self.error_sum_ms += e;
                self.abs_error_sum_ms += e.abs();
                self.max_abs_error_ms = self.max_abs_error_ms.max(e.abs());
            }
            JudgeKind::Miss => {
                self.misses += 1;
                self.streak = 0;
            }
            JudgeKind::MissPress => {
                self.miss_presses += 1;
                self.streak = 0;
            }
        }
    }

    /// Hits over judged entities; miss-presses do not count against it.
    pub fn accuracy(&self) -> f64 {
        let judged = self.hits + self.misses;
        if judged == 0 {
            return 0.0;
        }
        f64::from(self.hits) / f64::from(judged)
    }

    pub fn timing(&self) -> TimingStats {
        if self.hits == 0 {
            return TimingStats::default();
        }
        let count = f64::from(self.hits);
        TimingStats {
            mean_ms: self.error_sum_ms / count,
            mean_abs_ms: self.abs_error_sum_ms / count,
            max_abs_ms: self.max_abs_error_ms,
            count: self.hits,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub stats: SessionStats,
    pub timing: TimingStats,
    pub difficulty_reached: u32,
    pub runs_completed: u32,
    pub health_remaining: u32,
    pub max_health: u32,
    /// Survived past the last difficulty.
    pub cleared: bool,
    pub finished_at: String,
}

impl SessionSummary {
    pub fn new(
        stats: SessionStats,
        difficulty_reached: u32,
        runs_completed: u32,
        health_remaining: u32,
        max_health: u32,
        cleared: bool,
    ) -> Self {
        Self {
            stats,
            timing: stats.timing(),
            difficulty_reached,
            runs_completed,
            health_remaining,
            max_health,
            cleared,
            finished_at: Local::now().to_rfc3339(),
        }
    }
}

fn summaries_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mountainking").map(|dirs| dirs.data_dir().join("sessions"))
}

/// Writes the summary as JSON under the platform data directory.
pub fn save(summary: &SessionSummary) -> Result<PathBuf, String> {
    let dir = summaries_dir().ok_or_else(|| "No data directory available".to_string())?;
    save_to(&dir, summary)
}

pub fn save_to(dir: &Path, summary: &SessionSummary) -> Result<PathBuf, String> {
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("Failed to create session summary dir {dir:?}: {e}");
        return Err(e.to_string());
    }
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let path = dir.join(format!("session-{stamp}.json"));
    let json = serde_json::to_string_pretty(summary).map_err(|e| e.to_string())?;
    fs::write(&path, json).map_err(|e| format!("Failed to write {path:?}: {e}"))?;
    info!(
        "Stored session summary at {path:?} ({} hits, {} misses, difficulty {}).",
        summary.stats.hits, summary.stats.misses, summary.difficulty_reached
    );
    Ok(path)
}

#[cfg(test)]
pub fn load_from(path: &Path) -> Result<SessionSummary, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::{SessionStats, SessionSummary, load_from, save_to};
    use crate::game::judgment::{JudgeKind, Judgment};

    fn judgment(kind: JudgeKind) -> Judgment {
        judgment_at(kind, 0.0)
    }

    fn judgment_at(kind: JudgeKind, time_error_ms: f64) -> Judgment {
        Judgment {
            kind,
            lane: 0,
            symbol: 'a',
            entity_kind: None,
            time_error_ms,
            judged_at_ms: 0.0,
            trajectory: None,
        }
    }

    #[test]
    fn streak_tracks_best_run_of_hits() {
        let mut stats = SessionStats::default();
        for kind in [
            JudgeKind::Hit,
            JudgeKind::Hit,
            JudgeKind::Miss,
            JudgeKind::Hit,
            JudgeKind::MissPress,
            JudgeKind::Hit,
        ] {
            stats.record(&judgment(kind));
        }
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.miss_presses, 1);
        assert_eq!(stats.best_streak, 2);
        assert_eq!(stats.streak, 1);
        assert!((stats.accuracy() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn timing_covers_hits_only() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.timing().count, 0);
        for (kind, err) in [
            (JudgeKind::Hit, -20.0),
            (JudgeKind::Hit, 10.0),
            (JudgeKind::Miss, 250.0),
            (JudgeKind::Hit, 40.0),
        ] {
            stats.record(&judgment_at(kind, err));
        }
        let t = stats.timing();
        assert_eq!(t.count, 3);
        assert!((t.mean_ms - 10.0).abs() < 1e-9, "signed mean {}", t.mean_ms);
        assert!((t.mean_abs_ms - 70.0 / 3.0).abs() < 1e-9);
        assert_eq!(t.max_abs_ms, 40.0, "the miss offset is ignored");
    }

    #[test]
    fn summary_is_written_as_readable_json() {
        let dir = std::env::temp_dir().join(format!("mountainking-summary-{}", std::process::id()));
        let stats = SessionStats {
            hits: 12,
            misses: 3,
            ..SessionStats::default()
        };
        let summary = SessionSummary::new(stats, 2, 2, 17, 30, false);
        let path = save_to(&dir, &summary).expect("summary written");
        let text = std::fs::read_to_string(&path).expect("file readable");
        assert!(text.contains("\"hits\": 12"), "flattened stats in {text}");
        assert!(text.contains("\"mean_abs_ms\""), "timing block in {text}");
        assert_eq!(load_from(&path).expect("parses back"), summary);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
