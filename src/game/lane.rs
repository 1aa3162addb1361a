use crate::core::input::SubstitutionTable;
use crate::core::space;
use crate::game::entity::{Capabilities, EntityKind, Oscillation, ScheduledEntity, Trajectory};
use crate::game::judgment::{JudgeKind, Judgment, TickContext};
use crate::game::timeline::Timeline;
use crate::game::timing::TimingWindows;
use glam::Vec2;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Which notes feed a lane and what they turn into.
#[derive(Clone, Debug)]
pub struct LaneSpec {
    pub name: String,
    pub instruments: SmallVec<[String; 2]>,
    pub kind: EntityKind,
    /// Bottom of the lane row as a screen fraction.
    pub row: f32,
}

impl LaneSpec {
    pub fn new(name: &str, instruments: &[&str], kind: EntityKind, row: f32) -> Self {
        Self {
            name: name.to_string(),
            instruments: instruments.iter().map(|s| (*s).to_string()).collect(),
            kind,
            row,
        }
    }
}

/// Horizontal layout of a lane, in logical units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneGeometry {
    /// Left edge of an entity when it appears.
    pub spawn_x: f32,
    /// Where the left edge sits at the target time.
    pub judge_x: f32,
    pub row_y: f32,
    /// Travel speed as a fraction of the lane width per second.
    pub speed_fraction: f32,
}

impl LaneGeometry {
    pub fn for_row(row: f32, speed_fraction: f32) -> Self {
        Self {
            spawn_x: space::screen_width(),
            judge_x: space::judge_line_x(),
            row_y: row * space::screen_height(),
            speed_fraction,
        }
    }

    /// Units per millisecond.
    #[inline(always)]
    pub fn speed(&self) -> f32 {
        self.speed_fraction * self.spawn_x / 1000.0
    }

    /// Time from appearing to reaching the judgment line.
    #[inline(always)]
    pub fn transit_ms(&self) -> f64 {
        let speed = self.speed().max(f32::EPSILON);
        f64::from((self.spawn_x - self.judge_x) / speed)
    }
}

/// Everything needed to build a lane for one run.
#[derive(Clone, Copy, Debug)]
pub struct LaneBuild<'a> {
    pub timeline: &'a Timeline,
    pub max_difficulty: u32,
    pub substitutions: &'a SubstitutionTable,
    pub windows: TimingWindows,
    /// Music time of note time zero for this run (offsets already folded in).
    pub run_base_ms: f64,
}

/// One scrolling row: the notes of an instrument group, their open windows
/// and their expiry.
pub struct Lane {
    index: usize,
    name: String,
    windows: TimingWindows,
    /// Every entity for this run, ascending by spawn time.
    entities: Vec<ScheduledEntity>,
    /// `entities[cursor..]` have not spawned yet. Only ever moves forward.
    cursor: usize,
    in_flight: Vec<usize>,
    /// Per key, entities currently eligible for a press, oldest first.
    open_by_key: FxHashMap<char, VecDeque<usize>>,
}

impl Lane {
    pub fn new(index: usize, layout: &LaneSpec, geometry: LaneGeometry, build: &LaneBuild<'_>) -> Self {
        let transit_ms = geometry.transit_ms();
        let speed = geometry.speed();
        let size = layout.kind.size();
        let oscillation = layout
            .kind
            .capabilities()
            .contains(Capabilities::OSCILLATES)
            .then_some(Oscillation::DEFAULT);

        let mut entities: Vec<ScheduledEntity> = build
            .timeline
            .filtered(layout.instruments.as_slice(), build.max_difficulty)
            .map(|note| {
                let target_ms = build.run_base_ms + note.time;
                let trajectory = Trajectory {
                    origin: Vec2::new(geometry.spawn_x, geometry.row_y),
                    size,
                    spawn_ms: target_ms - transit_ms,
                    speed,
                    oscillation,
                };
                // Keys arrive lowercased, so lane symbols are too.
                let symbol = build
                    .substitutions
                    .resolve(build.max_difficulty, note.symbol)
                    .to_ascii_lowercase();
                ScheduledEntity::new(layout.kind, symbol, target_ms, trajectory)
            })
            .collect();
        // Already time-ordered; keep it explicit since the cursor depends on it.
        entities.sort_by(|a, b| a.spawn_ms().total_cmp(&b.spawn_ms()));

        debug!(
            "Lane {index} '{}' built: {} entities, transit {transit_ms:.1}ms, difficulty <= {}",
            layout.name,
            entities.len(),
            build.max_difficulty
        );

        Self {
            index,
            name: layout.name.clone(),
            windows: build.windows,
            entities,
            cursor: 0,
            in_flight: Vec::new(),
            open_by_key: FxHashMap::default(),
        }
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline(always)]
    pub fn entities(&self) -> &[ScheduledEntity] {
        &self.entities
    }

    #[inline(always)]
    pub fn in_flight(&self) -> &[usize] {
        &self.in_flight
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.entities.len() - self.cursor
    }

    #[cfg(test)]
    pub const fn activated_len(&self) -> usize {
        self.cursor
    }

    /// Nothing left to spawn or move.
    #[cfg(test)]
    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.entities.len() && self.in_flight.is_empty()
    }

    /// Open entities waiting on `symbol`, oldest first.
    #[cfg(test)]
    pub fn open_queue(&self, symbol: char) -> impl Iterator<Item = &ScheduledEntity> + '_ {
        self.open_by_key
            .get(&symbol)
            .into_iter()
            .flat_map(move |q| q.iter().map(move |&id| &self.entities[id]))
    }

    #[inline(always)]
    pub fn has_open(&self, symbol: char) -> bool {
        self.open_by_key.get(&symbol).is_some_and(|q| !q.is_empty())
    }

    fn remove_open(open_by_key: &mut FxHashMap<char, VecDeque<usize>>, symbol: char, id: usize) {
        if let Some(queue) = open_by_key.get_mut(&symbol) {
            queue.retain(|&queued| queued != id);
            if queue.is_empty() {
                open_by_key.remove(&symbol);
            }
        }
    }

    fn judgment(&self, id: usize, kind: JudgeKind, music_ms: f64) -> Judgment {
        let e = &self.entities[id];
        Judgment {
            kind,
            lane: self.index,
            symbol: e.symbol,
            entity_kind: Some(e.kind),
            time_error_ms: music_ms - e.target_ms,
            judged_at_ms: music_ms,
            trajectory: Some(e.trajectory),
        }
    }

    /// One tick: spawn what is due, move everything, open and expire windows.
    pub fn advance(&mut self, ctx: &mut TickContext<'_>) {
        let now = ctx.music_ms;

        while self.cursor < self.entities.len() && self.entities[self.cursor].spawn_ms() <= now {
            let id = self.cursor;
            self.entities[id].spawn(ctx.renderer);
            self.in_flight.push(id);
            self.cursor += 1;
            trace!("Lane {} spawned entity {id} at {now:.1}ms", self.index);
        }

        let mut misses: SmallVec<[usize; 4]> = SmallVec::new();
        let windows = self.windows;
        let entities = &mut self.entities;
        let open_by_key = &mut self.open_by_key;
        self.in_flight.retain(|&id| {
            let e = &mut entities[id];
            if e.update(now, ctx.renderer) {
                e.dispose(ctx.renderer);
                if !e.hit && !e.closed {
                    e.closed = true;
                    misses.push(id);
                }
                if e.open {
                    Self::remove_open(open_by_key, e.symbol, id);
                    e.open = false;
                }
                return false;
            }

            if !e.open && !e.closed && now >= windows.opens_at(e.target_ms) {
                e.open = true;
                open_by_key.entry(e.symbol).or_default().push_back(id);
            }
            if e.open && !e.closed && now >= windows.closes_at(e.target_ms) {
                e.closed = true;
                e.open = false;
                Self::remove_open(open_by_key, e.symbol, id);
                misses.push(id);
            }
            true
        });

        for id in misses {
            self.report_miss(id, ctx);
        }
    }

    fn report_miss(&self, id: usize, ctx: &mut TickContext<'_>) {
        let now = ctx.music_ms;
        let judgment = self.judgment(id, JudgeKind::Miss, now);
        debug!(
            "MISS lane={} symbol='{}' target={:.1}ms at={now:.1}ms",
            self.name, judgment.symbol, self.entities[id].target_ms
        );
        ctx.report(judgment);
    }

    /// Last pass when the track wraps, at the final position of the run.
    /// Anything spawned and still unjudged can no longer be pressed, so it is
    /// a miss. Entities that never spawned lie past the end of the track.
    pub fn close_run(&mut self, ctx: &mut TickContext<'_>) {
        self.advance(ctx);
        let mut misses: SmallVec<[usize; 4]> = SmallVec::new();
        for &id in &self.in_flight {
            let e = &mut self.entities[id];
            if !e.hit && !e.closed {
                e.closed = true;
                e.open = false;
                misses.push(id);
            }
        }
        self.open_by_key.clear();
        if self.cursor < self.entities.len() {
            debug!(
                "Lane {} '{}': {} entities past the end of the run dropped",
                self.index,
                self.name,
                self.entities.len() - self.cursor
            );
        }
        for id in misses {
            self.report_miss(id, ctx);
        }
    }

    /// Judges a press against the oldest open entity for `symbol`. Returns
    /// whether the press was consumed. Only the front of the queue is tried.
    pub fn on_key_press(&mut self, symbol: char, ctx: &mut TickContext<'_>) -> bool {
        let now = ctx.music_ms;
        let Some(&id) = self.open_by_key.get(&symbol).and_then(VecDeque::front) else {
            return false;
        };
        let hit_time = now - self.entities[id].target_ms;
        if !self.windows.accepts(hit_time) {
            trace!(
                "Lane {} rejected '{symbol}' at {now:.1}ms (offset {hit_time:.1}ms)",
                self.index
            );
            return false;
        }

        Self::remove_open(&mut self.open_by_key, symbol, id);
        let e = &mut self.entities[id];
        e.hit = true;
        e.closed = true;
        e.open = false;
        let judgment = self.judgment(id, JudgeKind::Hit, now);
        if self.entities[id].hit_reaction(ctx.renderer) {
            self.entities[id].dispose(ctx.renderer);
            self.in_flight.retain(|&x| x != id);
        }
        debug!(
            "HIT lane={} symbol='{symbol}' offset={hit_time:+.1}ms",
            self.name
        );
        ctx.report(judgment);
        true
    }

    /// Releases every in-flight entity and drops the pending ones.
    pub fn dispose_all(&mut self, ctx: &mut TickContext<'_>) {
        for id in self.in_flight.drain(..) {
            self.entities[id].dispose(ctx.renderer);
        }
        for e in &mut self.entities[self.cursor..] {
            e.done = true;
        }
        self.cursor = self.entities.len();
        self.open_by_key.clear();
    }
}
