use crate::config::{self, Config};
use crate::core::audio::SimulatedClock;
use crate::core::gfx::QuadBuffer;
use crate::core::input::{KEY_RETURN, KeyCode};
use crate::game::gameplay::{Session, SessionAction, SessionSettings};
use crate::game::parsing::timeline as timeline_loading;
use crate::game::summary;
use crate::game::timing::TimingWindows;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::{error::Error, path::Path, sync::Arc};

/* -------------------- runner constants -------------------- */
// Silence after the last note before the backing track loops.
const TRACK_TAIL_MS: f64 = 2000.0;
// Hard stop for a session that somehow never ends.
const MAX_SESSION_MS: f64 = 60.0 * 60.0 * 1000.0;
// Share of notes autoplay deliberately lets through.
const AUTOPLAY_SKIP_CHANCE: f64 = 0.03;
// Autoplay aims within this share of each window.
const AUTOPLAY_WINDOW_USE: f64 = 0.7;

/// Presses every open key once, at its target plus a seeded jitter.
struct Autoplay {
    rng: StdRng,
    // (difficulty, lane, entity) -> planned press time; infinity once pressed or skipped.
    planned: FxHashMap<(u32, usize, usize), f64>,
    early_ms: f64,
    late_ms: f64,
}

impl Autoplay {
    fn new(seed: u64, windows: TimingWindows) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            planned: FxHashMap::default(),
            early_ms: windows.before_ms * AUTOPLAY_WINDOW_USE,
            late_ms: windows.after_ms * AUTOPLAY_WINDOW_USE,
        }
    }

    fn due_presses(&mut self, session: &Session<SimulatedClock>) -> SmallVec<[char; 4]> {
        let now = session.music_ms();
        let difficulty = session.difficulty();
        let mut due = SmallVec::new();
        let rng = &mut self.rng;
        let (early, late) = (self.early_ms, self.late_ms);
        for lane in session.lanes() {
            let open = lane
                .entities()
                .iter()
                .enumerate()
                .filter(|(_, e)| e.open && !e.closed);
            for (idx, e) in open {
                let key = (difficulty, lane.index(), idx);
                let press_at = self.planned.entry(key).or_insert_with(|| {
                    if rng.random_bool(AUTOPLAY_SKIP_CHANCE) {
                        f64::INFINITY
                    } else {
                        e.target_ms + rng.random_range(-early..=late)
                    }
                });
                if now >= *press_at {
                    due.push(e.symbol);
                    *press_at = f64::INFINITY;
                }
            }
        }
        due
    }
}

fn load_timeline(cfg: &Config) -> Result<Arc<crate::game::timeline::Timeline>, Box<dyn Error>> {
    let path = Path::new(&cfg.timeline_path);
    let timeline = timeline_loading::load(path)?;
    if timeline.is_empty() {
        warn!("Timeline '{}' has no notes.", path.display());
    }
    info!(
        "Parsed {} notes from '{}' (ends at {:.0}ms).",
        timeline.len(),
        path.display(),
        timeline.end_time()
    );
    Ok(Arc::new(timeline))
}

/// Headless host loop: a simulated looping track, fixed-rate ticks and
/// autoplay input, until the session ends.
pub fn run() -> Result<(), Box<dyn Error>> {
    let cfg = config::get();
    let timeline = load_timeline(&cfg)?;
    let track_ms = (timeline.end_time() + TRACK_TAIL_MS).ceil() as i64;
    let clock = SimulatedClock::new(track_ms, true);
    info!("Simulated track: {}ms, looping.", clock.track_length_ms());

    let mut renderer = QuadBuffer::with_capacity(256);
    let mut session = Session::new(
        SessionSettings::from_config(&cfg),
        timeline,
        clock,
    );
    let mut autoplay = Autoplay::new(cfg.autoplay_seed, cfg.timing_windows());
    let frame_ms = 1000.0 / f64::from(cfg.tick_rate.max(1));

    // Leave the start menu.
    session.key_down(KeyCode(KEY_RETURN), &mut renderer);

    let mut elapsed_ms = 0.0;
    let mut peak_quads = 0usize;
    let mut peak_glyphs = 0usize;
    let outcome = loop {
        session.audio_mut().advance(frame_ms);
        let mut action = session.update(frame_ms, &mut renderer);
        let frame = renderer.draw_list();
        peak_quads = peak_quads.max(frame.len());
        peak_glyphs = peak_glyphs.max(frame.iter().filter(|q| q.is_glyph()).count());
        if action == SessionAction::None {
            for symbol in autoplay.due_presses(&session) {
                let code = KeyCode(symbol as u32);
                action = session.key_down(code, &mut renderer);
                session.key_up(code, &mut renderer);
                if action != SessionAction::None {
                    break;
                }
            }
        }
        if action != SessionAction::None {
            break action;
        }
        elapsed_ms += frame_ms;
        if elapsed_ms >= MAX_SESSION_MS {
            warn!("Session still running after {MAX_SESSION_MS:.0}ms; stopping.");
            break SessionAction::Quit;
        }
    };

    let stats = session.stats();
    info!(
        "Session ended ({outcome:?}) after {:.1}s in {:?} on {:?} menu: {} runs over {} track passes.",
        elapsed_ms / 1000.0,
        session.phase(),
        session.menu(),
        session.runs_completed(),
        session.audio().loops_completed()
    );
    info!(
        "{} hits, {} misses, {} miss-presses, accuracy {:.1}%, health {}/{}.",
        stats.hits,
        stats.misses,
        stats.miss_presses,
        stats.accuracy() * 100.0,
        session.health().current(),
        session.health().max()
    );
    let timing = stats.timing();
    info!(
        "Timing over {} hits: mean {:+.1}ms, mean abs {:.1}ms, worst {:.1}ms.",
        timing.count, timing.mean_ms, timing.mean_abs_ms, timing.max_abs_ms
    );
    info!("Peak frame: {peak_quads} quads, {peak_glyphs} glyphs.");

    let result = session.summary();
    if let Err(e) = summary::save(&result) {
        warn!("Failed to save session summary: {e}");
    }
    session.dispose(&mut renderer);
    if renderer.live_count() != 0 {
        warn!("{} drawables leaked at shutdown.", renderer.live_count());
    }
    Ok(())
}
