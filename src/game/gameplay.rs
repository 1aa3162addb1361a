use crate::config::Config;
use crate::core::audio::AudioClock;
use crate::core::gfx::{Drawable, Renderer};
use crate::core::input::{InputAction, KeyCode, SubstitutionTable, map_key_code};
use crate::core::space;
use crate::game::entity::EntityKind;
use crate::game::judgment::{JudgeKind, Judgment, TickContext};
use crate::game::lane::{Lane, LaneBuild, LaneGeometry, LaneSpec};
use crate::game::life::{DamageTable, Health};
use crate::game::player::Player;
use crate::game::summary::{SessionStats, SessionSummary};
use crate::game::timeline::Timeline;
use crate::game::timing::{ClockSample, RunClock, TimingWindows};
use glam::Vec2;
use log::{debug, info};
use smallvec::SmallVec;
use std::sync::Arc;

// The difficulty banner fades in and out over at most this long.
const ANNOUNCE_FADE_MS: f64 = 1000.0;
const ANNOUNCE_GLYPH: Vec2 = Vec2::new(48.0, 64.0);
const DEPTH_ANNOUNCE: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Playing,
    Paused,
    /// Silent interval between runs while the next difficulty is announced.
    GapTransition,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Menu {
    None,
    /// Start screen, also shown while paused.
    Main,
    /// Health ran out.
    Retry,
    Summary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    None,
    Quit,
    Failed,
    Finished,
}

/// The standard five rows.
pub fn default_lane_layout() -> Vec<LaneSpec> {
    vec![
        LaneSpec::new("blocks", &["horn", "strings"], EntityKind::Block, 0.45),
        LaneSpec::new("targets", &["flute"], EntityKind::Target, 0.65),
        LaneSpec::new("monsters", &["drum"], EntityKind::Monster, 0.1),
        LaneSpec::new("walls", &["cymbal"], EntityKind::Wall, 0.1),
        LaneSpec::new("smash", &["bass"], EntityKind::DestructibleWall, 0.1),
    ]
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub windows: TimingWindows,
    pub static_offset_ms: f64,
    pub gap_ms: f64,
    pub lane_speed: f32,
    pub max_difficulty: u32,
    pub max_health: u32,
    pub damage_table: DamageTable,
    pub substitutions: SubstitutionTable,
    pub lanes: Vec<LaneSpec>,
}

impl SessionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            windows: cfg.timing_windows(),
            static_offset_ms: cfg.global_offset_ms,
            gap_ms: cfg.gap_ms.max(0.0),
            lane_speed: cfg.lane_speed,
            max_difficulty: cfg.max_difficulty,
            max_health: cfg.max_health,
            damage_table: cfg.damage_table.clone(),
            substitutions: cfg.substitutions.clone(),
            lanes: default_lane_layout(),
        }
    }
}

/// Alpha of the difficulty banner `elapsed_ms` into a gap of `gap_ms`.
pub fn announcement_alpha(elapsed_ms: f64, gap_ms: f64) -> f32 {
    if gap_ms <= 0.0 {
        return 0.0;
    }
    let fade = ANNOUNCE_FADE_MS.min(gap_ms / 2.0);
    let alpha = if elapsed_ms < fade {
        elapsed_ms / fade
    } else if elapsed_ms > gap_ms - fade {
        (gap_ms - elapsed_ms) / fade
    } else {
        1.0
    };
    alpha.clamp(0.0, 1.0) as f32
}

struct Announcement {
    glyphs: SmallVec<[Drawable; 16]>,
}

impl Announcement {
    fn show(difficulty: u32, renderer: &mut dyn Renderer) -> Self {
        let text = format!("LEVEL {difficulty}");
        let width = ANNOUNCE_GLYPH.x * text.chars().count() as f32;
        let origin = space::relative(0.5, 0.7) - Vec2::new(width / 2.0, 0.0);
        let mut glyphs = SmallVec::new();
        for (i, ch) in text.chars().enumerate().filter(|(_, c)| !c.is_whitespace()) {
            let d = renderer.letter_glyph(ch, DEPTH_ANNOUNCE);
            let bl = origin + Vec2::new(ANNOUNCE_GLYPH.x * i as f32, 0.0);
            renderer.draw_rect(d, bl, bl + ANNOUNCE_GLYPH);
            renderer.set_alpha(d, 0.0);
            glyphs.push(d);
        }
        Self { glyphs }
    }

    fn set_alpha(&self, alpha: f32, renderer: &mut dyn Renderer) {
        for &d in &self.glyphs {
            renderer.set_alpha(d, alpha);
        }
    }

    fn dispose(self, renderer: &mut dyn Renderer) {
        for d in self.glyphs {
            renderer.release(d);
        }
    }
}

/// One play session: runs of the backing track at rising difficulty until
/// health runs out or the last difficulty is survived.
pub struct Session<A: AudioClock> {
    settings: SessionSettings,
    timeline: Arc<Timeline>,
    audio: A,
    clock: RunClock,
    lanes: Vec<Lane>,
    phase: Phase,
    paused_from: Phase,
    menu: Menu,
    difficulty: u32,
    runs_completed: u32,
    health: Health,
    player: Player,
    stats: SessionStats,
    announcement: Option<Announcement>,
    gap_elapsed_ms: f64,
    // Reused across ticks.
    judgments: Vec<Judgment>,
    log_timer: f64,
    cleared: bool,
}

impl<A: AudioClock> Session<A> {
    pub fn new(settings: SessionSettings, timeline: Arc<Timeline>, audio: A) -> Self {
        let health = Health::new(settings.max_health, settings.damage_table.clone());
        let clock = RunClock::new(settings.static_offset_ms);
        let mut session = Self {
            settings,
            timeline,
            audio,
            clock,
            lanes: Vec::new(),
            phase: Phase::NotStarted,
            paused_from: Phase::NotStarted,
            menu: Menu::Main,
            difficulty: 0,
            runs_completed: 0,
            health,
            player: Player::new(),
            stats: SessionStats::default(),
            announcement: None,
            gap_elapsed_ms: 0.0,
            judgments: Vec::with_capacity(16),
            log_timer: 0.0,
            cleared: false,
        };
        session.lanes = session.build_lanes(session.clock.run_base_ms());
        session
    }

    #[inline(always)]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[inline(always)]
    pub const fn menu(&self) -> Menu {
        self.menu
    }

    #[inline(always)]
    pub const fn difficulty(&self) -> u32 {
        self.difficulty
    }

    #[inline(always)]
    pub const fn runs_completed(&self) -> u32 {
        self.runs_completed
    }

    #[inline(always)]
    pub fn music_ms(&self) -> f64 {
        self.clock.music_ms()
    }

    #[inline(always)]
    pub const fn health(&self) -> &Health {
        &self.health
    }

    #[inline(always)]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    #[inline(always)]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    #[inline(always)]
    pub const fn audio(&self) -> &A {
        &self.audio
    }

    #[inline(always)]
    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    /// Banner alpha while a gap is running.
    #[cfg(test)]
    pub fn announcement_alpha(&self) -> Option<f32> {
        self.announcement
            .as_ref()
            .map(|_| announcement_alpha(self.gap_elapsed_ms, self.settings.gap_ms))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(
            self.stats,
            self.difficulty.min(self.settings.max_difficulty),
            self.runs_completed,
            self.health.current(),
            self.health.max(),
            self.cleared,
        )
    }

    fn build_lanes(&self, run_base_ms: f64) -> Vec<Lane> {
        let build = LaneBuild {
            timeline: &self.timeline,
            max_difficulty: self.difficulty,
            substitutions: &self.settings.substitutions,
            windows: self.settings.windows,
            run_base_ms,
        };
        self.settings
            .lanes
            .iter()
            .enumerate()
            .map(|(i, layout)| {
                let geometry = LaneGeometry::for_row(layout.row, self.settings.lane_speed);
                Lane::new(i, layout, geometry, &build)
            })
            .collect()
    }

    fn dispose_lanes(&mut self, renderer: &mut dyn Renderer) {
        let mut ctx = TickContext::new(self.clock.music_ms(), renderer, &mut self.judgments);
        for lane in &mut self.lanes {
            lane.dispose_all(&mut ctx);
        }
        self.lanes.clear();
        self.judgments.clear();
    }

    pub fn start(&mut self) {
        if self.phase != Phase::NotStarted {
            return;
        }
        info!(
            "Session started: {} notes, {} lanes, difficulty 0..={}.",
            self.timeline.len(),
            self.lanes.len(),
            self.settings.max_difficulty
        );
        self.audio.play(0);
        self.phase = Phase::Playing;
        self.menu = Menu::None;
    }

    pub fn pause(&mut self) {
        if !matches!(self.phase, Phase::Playing | Phase::GapTransition) {
            return;
        }
        if self.phase == Phase::Playing {
            self.audio.pause();
        }
        self.paused_from = self.phase;
        self.phase = Phase::Paused;
        self.menu = Menu::Main;
        info!("Paused at {:.0}ms.", self.clock.music_ms());
    }

    pub fn resume(&mut self) {
        if self.phase != Phase::Paused || self.menu != Menu::Main {
            return;
        }
        if self.paused_from == Phase::Playing {
            self.audio.resume();
        }
        self.phase = self.paused_from;
        self.menu = Menu::None;
        info!("Resumed at {:.0}ms.", self.clock.music_ms());
    }

    /// Tears everything down synchronously and starts over from difficulty zero.
    pub fn replay(&mut self, renderer: &mut dyn Renderer) {
        info!("Replaying session.");
        self.audio.stop();
        self.dispose_lanes(renderer);
        self.player.dispose(renderer);
        if let Some(a) = self.announcement.take() {
            a.dispose(renderer);
        }
        self.clock.reset();
        self.health.reset();
        self.stats = SessionStats::default();
        self.difficulty = 0;
        self.runs_completed = 0;
        self.gap_elapsed_ms = 0.0;
        self.log_timer = 0.0;
        self.cleared = false;
        self.lanes = self.build_lanes(self.clock.run_base_ms());
        self.phase = Phase::NotStarted;
        self.start();
    }

    fn finish(&mut self, renderer: &mut dyn Renderer) -> SessionAction {
        self.dispose_lanes(renderer);
        if let Some(a) = self.announcement.take() {
            a.dispose(renderer);
        }
        self.audio.stop();
        self.cleared = true;
        self.phase = Phase::Finished;
        self.menu = Menu::Summary;
        info!(
            "Session cleared: {} hits, {} misses, best streak {}.",
            self.stats.hits, self.stats.misses, self.stats.best_streak
        );
        SessionAction::Finished
    }

    fn fail(&mut self) -> SessionAction {
        self.audio.pause();
        self.paused_from = self.phase;
        self.phase = Phase::Paused;
        self.menu = Menu::Retry;
        info!(
            "Player has failed at difficulty {} ({:.0}ms).",
            self.difficulty,
            self.clock.music_ms()
        );
        SessionAction::Failed
    }

    fn on_run_completed(&mut self, completed_run_ms: f64, renderer: &mut dyn Renderer) -> SessionAction {
        // The wrapped clock sits at the end of the finished run.
        {
            let mut ctx = TickContext::new(self.clock.music_ms(), renderer, &mut self.judgments);
            for lane in &mut self.lanes {
                lane.close_run(&mut ctx);
            }
        }
        let action = self.apply_judgments(renderer);
        if action != SessionAction::None {
            return action;
        }

        self.runs_completed += 1;
        self.difficulty += 1;
        self.dispose_lanes(renderer);
        if self.difficulty > self.settings.max_difficulty {
            return self.finish(renderer);
        }
        info!(
            "Run {} complete after {completed_run_ms:.0}ms. Difficulty now {}.",
            self.runs_completed, self.difficulty
        );
        self.audio.stop();
        self.phase = Phase::GapTransition;
        self.gap_elapsed_ms = 0.0;
        if let Some(a) = self.announcement.take() {
            a.dispose(renderer);
        }
        self.announcement = Some(Announcement::show(self.difficulty, renderer));
        self.lanes = self.build_lanes(self.clock.run_base_ms() + self.settings.gap_ms);
        SessionAction::None
    }

    fn end_gap(&mut self, renderer: &mut dyn Renderer) {
        self.clock.finish_gap(self.settings.gap_ms);
        if let Some(a) = self.announcement.take() {
            a.dispose(renderer);
        }
        self.audio.play(0);
        self.phase = Phase::Playing;
        debug!("Gap over; run {} starts at {:.0}ms.", self.runs_completed + 1, self.clock.music_ms());
    }

    /// One host frame. Clock first, then lanes, then judgments, then the player.
    pub fn update(&mut self, delta_ms: f64, renderer: &mut dyn Renderer) -> SessionAction {
        let delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };

        match self.phase {
            Phase::NotStarted | Phase::Paused | Phase::Finished => return SessionAction::None,
            Phase::GapTransition => {
                self.gap_elapsed_ms += delta_ms;
                if self.gap_elapsed_ms >= self.settings.gap_ms {
                    self.end_gap(renderer);
                } else {
                    self.clock.set_gap_elapsed(self.gap_elapsed_ms);
                    let alpha = announcement_alpha(self.gap_elapsed_ms, self.settings.gap_ms);
                    if let Some(a) = &self.announcement {
                        a.set_alpha(alpha, renderer);
                    }
                }
            }
            Phase::Playing => {
                if let ClockSample::Wrapped { completed_run_ms } =
                    self.clock.observe(self.audio.current_position_ms())
                {
                    let action = self.on_run_completed(completed_run_ms, renderer);
                    if action != SessionAction::None {
                        return action;
                    }
                }
            }
        }

        let music_ms = self.clock.music_ms();
        {
            let mut ctx = TickContext::new(music_ms, renderer, &mut self.judgments);
            for lane in &mut self.lanes {
                lane.advance(&mut ctx);
            }
        }
        let action = self.apply_judgments(renderer);
        self.player.update(music_ms, renderer);

        self.log_timer += delta_ms;
        if self.log_timer >= 1000.0 {
            let in_flight: usize = self.lanes.iter().map(|l| l.in_flight().len()).sum();
            info!(
                "Time: {:.0}ms, Difficulty: {}, Health: {:.0}%, Streak: {}, Misses: {}, In flight: {}, Shots: {}, Pose: {:?}",
                music_ms,
                self.difficulty,
                self.health.fraction() * 100.0,
                self.stats.streak,
                self.stats.misses,
                in_flight,
                self.player.projectiles().len(),
                self.player.pose()
            );
            self.log_timer -= 1000.0;
        }
        action
    }

    fn apply_judgments(&mut self, renderer: &mut dyn Renderer) -> SessionAction {
        let mut judgments = std::mem::take(&mut self.judgments);
        for j in judgments.drain(..) {
            self.stats.record(&j);
            match j.kind {
                JudgeKind::Hit => {
                    self.health.on_hit();
                    if let Some(kind) = j.entity_kind {
                        self.player
                            .perform(kind.action(), j.trajectory.as_ref(), j.judged_at_ms, renderer);
                    }
                }
                JudgeKind::Miss | JudgeKind::MissPress => {
                    let damage = self.health.on_miss();
                    self.player.hurt(j.judged_at_ms, renderer);
                    debug!(
                        "{:?} '{}' lane={} costs {damage} (streak {}, health {})",
                        j.kind,
                        j.symbol,
                        j.lane,
                        self.health.miss_streak(),
                        self.health.current()
                    );
                }
            }
        }
        self.judgments = judgments;

        if self.health.is_depleted() && matches!(self.phase, Phase::Playing | Phase::GapTransition) {
            return self.fail();
        }
        SessionAction::None
    }

    /// Routes a press to the lanes in order; the first lane to accept it wins.
    /// A press nobody accepts while some lane has that key open is a miss-press.
    fn press(&mut self, symbol: char, renderer: &mut dyn Renderer) -> (bool, SessionAction) {
        let music_ms = self.clock.music_ms();
        let consumed = {
            let mut ctx = TickContext::new(music_ms, renderer, &mut self.judgments);
            self.lanes.iter_mut().any(|lane| lane.on_key_press(symbol, &mut ctx))
        };
        if !consumed && let Some(lane) = self.lanes.iter().find(|l| l.has_open(symbol)) {
            self.judgments.push(Judgment {
                kind: JudgeKind::MissPress,
                lane: lane.index(),
                symbol,
                entity_kind: None,
                time_error_ms: 0.0,
                judged_at_ms: music_ms,
                trajectory: None,
            });
        }
        (consumed, self.apply_judgments(renderer))
    }

    pub fn key_down(&mut self, code: KeyCode, renderer: &mut dyn Renderer) -> SessionAction {
        let Some(ev) = map_key_code(code, true) else {
            return SessionAction::None;
        };
        match ev.action {
            InputAction::Menu => match (self.phase, self.menu) {
                (Phase::Playing | Phase::GapTransition, _) => {
                    self.pause();
                    SessionAction::None
                }
                (Phase::Paused, Menu::Main) => {
                    self.resume();
                    SessionAction::None
                }
                _ => {
                    info!("Quit requested from {:?} menu.", self.menu);
                    SessionAction::Quit
                }
            },
            InputAction::Confirm => {
                match (self.phase, self.menu) {
                    (Phase::NotStarted, _) => self.start(),
                    (Phase::Paused, Menu::Main) => self.resume(),
                    (_, Menu::Retry | Menu::Summary) => self.replay(renderer),
                    _ => {}
                }
                SessionAction::None
            }
            InputAction::Symbol(symbol) => {
                if !matches!(self.phase, Phase::Playing | Phase::GapTransition) {
                    return SessionAction::None;
                }
                self.press(symbol, renderer).1
            }
        }
    }

    pub fn key_up(&mut self, code: KeyCode, renderer: &mut dyn Renderer) {
        if let Some(ev) = map_key_code(code, false)
            && matches!(ev.action, InputAction::Symbol(_))
        {
            self.player.release_duck(self.clock.music_ms(), renderer);
        }
    }

    /// Releases every renderer resource the session holds.
    pub fn dispose(&mut self, renderer: &mut dyn Renderer) {
        self.audio.stop();
        self.dispose_lanes(renderer);
        self.player.dispose(renderer);
        if let Some(a) = self.announcement.take() {
            a.dispose(renderer);
        }
        debug!("Session disposed while {:?}.", self.phase);
    }
}
