use crate::core::gfx::{Drawable, Renderer};
use crate::game::player::PlayerAction;
use bitflags::bitflags;
use glam::Vec2;
use std::f32::consts::TAU;

// Render depths, smaller is nearer.
const DEPTH_BODY: f32 = 0.5;
const DEPTH_LABEL: f32 = 0.4;

// Fraction of a destructible wall's height taken by its removable bottom part.
const BOTTOM_PART_FRACTION: f32 = 0.4;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Carries a letter label showing its key.
        const SECONDARY_LABEL = 1 << 0;
        /// Destroyed by a successful press; otherwise it is dodged and keeps moving.
        const HITTABLE = 1 << 1;
        /// Has a bottom part that a successful press removes.
        const MULTI_PART = 1 << 2;
        /// Bobs vertically on a sine around its lane row.
        const OSCILLATES = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Block,
    Monster,
    Wall,
    DestructibleWall,
    Target,
}

impl EntityKind {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Block => Capabilities::SECONDARY_LABEL.union(Capabilities::HITTABLE),
            Self::Monster | Self::Wall => Capabilities::empty(),
            Self::DestructibleWall => Capabilities::MULTI_PART,
            Self::Target => Capabilities::HITTABLE.union(Capabilities::OSCILLATES),
        }
    }

    pub const fn texture(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Monster => "monster",
            Self::Wall => "wall",
            Self::DestructibleWall => "wall_top",
            Self::Target => "target",
        }
    }

    pub fn size(self) -> Vec2 {
        match self {
            Self::Block => Vec2::new(64.0, 64.0),
            Self::Monster => Vec2::new(72.0, 96.0),
            Self::Wall => Vec2::new(48.0, 160.0),
            Self::DestructibleWall => Vec2::new(56.0, 200.0),
            Self::Target => Vec2::new(56.0, 56.0),
        }
    }

    /// What the player character does when this kind is judged a hit.
    pub const fn action(self) -> PlayerAction {
        match self {
            Self::Block | Self::Target => PlayerAction::Shoot,
            Self::Monster => PlayerAction::Jump,
            Self::Wall => PlayerAction::Duck,
            Self::DestructibleWall => PlayerAction::Smash,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Oscillation {
    pub amplitude: f32,
    pub period_ms: f32,
}

impl Oscillation {
    pub const DEFAULT: Self = Self {
        amplitude: 40.0,
        period_ms: 900.0,
    };
}

/// Pure function of music time: where an entity is at any moment. Positions
/// are always recomputed from elapsed time since spawn, never integrated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trajectory {
    /// Bottom-left corner at spawn.
    pub origin: Vec2,
    pub size: Vec2,
    pub spawn_ms: f64,
    /// Leftward travel in logical units per millisecond.
    pub speed: f32,
    pub oscillation: Option<Oscillation>,
}

impl Trajectory {
    #[inline(always)]
    pub fn elapsed_ms(&self, music_ms: f64) -> f32 {
        (music_ms - self.spawn_ms) as f32
    }

    pub fn position_at(&self, music_ms: f64) -> Vec2 {
        let elapsed = self.elapsed_ms(music_ms);
        let x = elapsed.mul_add(-self.speed, self.origin.x);
        let y = match self.oscillation {
            Some(osc) if osc.period_ms > 0.0 => {
                osc.amplitude.mul_add((TAU * elapsed / osc.period_ms).sin(), self.origin.y)
            }
            _ => self.origin.y,
        };
        Vec2::new(x, y)
    }

    /// Center point, used to aim projectiles.
    #[inline(always)]
    pub fn center_at(&self, music_ms: f64) -> Vec2 {
        self.position_at(music_ms) + self.size * 0.5
    }

    /// Fully past the left edge.
    #[inline(always)]
    pub fn passed_at(&self, music_ms: f64) -> bool {
        self.position_at(music_ms).x + self.size.x <= 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Visuals {
    body: Option<Drawable>,
    label: Option<Drawable>,
    bottom: Option<Drawable>,
}

impl Visuals {
    fn release(&mut self, renderer: &mut dyn Renderer) {
        for slot in [&mut self.body, &mut self.label, &mut self.bottom] {
            if let Some(d) = slot.take() {
                renderer.release(d);
            }
        }
    }
}

/// One on-screen object materialized from a note. Owned by its lane.
#[derive(Clone, Debug)]
pub struct ScheduledEntity {
    pub kind: EntityKind,
    pub symbol: char,
    /// Absolute music time at which it reaches the judgment line.
    pub target_ms: f64,
    pub trajectory: Trajectory,
    pub open: bool,
    pub closed: bool,
    pub hit: bool,
    pub done: bool,
    spawned: bool,
    visuals: Visuals,
}

impl ScheduledEntity {
    pub fn new(kind: EntityKind, symbol: char, target_ms: f64, trajectory: Trajectory) -> Self {
        Self {
            kind,
            symbol,
            target_ms,
            trajectory,
            open: false,
            closed: false,
            hit: false,
            done: false,
            spawned: false,
            visuals: Visuals::default(),
        }
    }

    #[inline(always)]
    pub const fn spawn_ms(&self) -> f64 {
        self.trajectory.spawn_ms
    }

    #[cfg(test)]
    pub const fn is_spawned(&self) -> bool {
        self.spawned
    }

    #[inline(always)]
    pub const fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    #[cfg(test)]
    pub fn has_bottom_part(&self) -> bool {
        self.visuals.bottom.is_some()
    }

    pub fn spawn(&mut self, renderer: &mut dyn Renderer) {
        debug_assert!(!self.spawned, "entity spawned twice");
        if self.spawned {
            return;
        }
        self.spawned = true;
        let caps = self.capabilities();
        self.visuals.body = Some(renderer.quad(self.kind.texture(), DEPTH_BODY));
        if caps.contains(Capabilities::SECONDARY_LABEL) {
            self.visuals.label = Some(renderer.letter_glyph(self.symbol, DEPTH_LABEL));
        }
        if caps.contains(Capabilities::MULTI_PART) {
            self.visuals.bottom = Some(renderer.quad("wall_bottom", DEPTH_BODY));
        }
    }

    /// Moves visuals to their position at `music_ms`; returns true once the
    /// entity has fully passed the left edge.
    pub fn update(&mut self, music_ms: f64, renderer: &mut dyn Renderer) -> bool {
        if self.done {
            return true;
        }
        let bl = self.trajectory.position_at(music_ms);
        let size = self.trajectory.size;
        if self.capabilities().contains(Capabilities::MULTI_PART) {
            let split = size.y * BOTTOM_PART_FRACTION;
            if let Some(bottom) = self.visuals.bottom {
                renderer.draw_rect(bottom, bl, bl + Vec2::new(size.x, split));
            }
            if let Some(body) = self.visuals.body {
                renderer.draw_rect(body, bl + Vec2::new(0.0, split), bl + size);
            }
        } else if let Some(body) = self.visuals.body {
            renderer.draw_rect(body, bl, bl + size);
        }
        if let Some(label) = self.visuals.label {
            let quarter = size * 0.25;
            renderer.draw_rect(label, bl + quarter, bl + size - quarter);
        }
        if self.trajectory.passed_at(music_ms) {
            self.done = true;
        }
        self.done
    }

    /// Reaction to an accepted press. Returns true when the entity should be
    /// detached from its lane right away.
    pub fn hit_reaction(&mut self, renderer: &mut dyn Renderer) -> bool {
        let caps = self.capabilities();
        if caps.contains(Capabilities::MULTI_PART) {
            // Only the bottom goes; the rest keeps its own lifecycle.
            if let Some(bottom) = self.visuals.bottom.take() {
                renderer.release(bottom);
            }
        }
        caps.contains(Capabilities::HITTABLE)
    }

    /// Releases every visual. Safe to call any number of times.
    pub fn dispose(&mut self, renderer: &mut dyn Renderer) {
        self.done = true;
        self.visuals.release(renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, EntityKind, Oscillation, ScheduledEntity, Trajectory};
    use crate::core::gfx::QuadBuffer;
    use glam::Vec2;

    fn trajectory(oscillation: Option<Oscillation>) -> Trajectory {
        Trajectory {
            origin: Vec2::new(1000.0, 100.0),
            size: Vec2::new(50.0, 50.0),
            spawn_ms: 0.0,
            speed: 1.0,
            oscillation,
        }
    }

    #[test]
    fn position_is_a_function_of_elapsed_time() {
        let t = trajectory(None);
        assert_eq!(t.position_at(0.0), Vec2::new(1000.0, 100.0));
        assert_eq!(t.position_at(400.0), Vec2::new(600.0, 100.0));
        // Recomputing an earlier time yields the same value; no integration state.
        assert_eq!(t.position_at(0.0), Vec2::new(1000.0, 100.0));
    }

    #[test]
    fn oscillating_center_follows_sine() {
        let osc = Oscillation {
            amplitude: 10.0,
            period_ms: 400.0,
        };
        let t = trajectory(Some(osc));
        let quarter = t.center_at(100.0);
        assert!((quarter.y - 135.0).abs() < 1e-3, "peak expected, got {quarter:?}");
        let half = t.center_at(200.0);
        assert!((half.y - 125.0).abs() < 1e-3, "zero crossing expected, got {half:?}");
        assert!((half.x - 825.0).abs() < 1e-3);
    }

    #[test]
    fn done_once_fully_past_left_edge() {
        let mut buf = QuadBuffer::default();
        let mut e = ScheduledEntity::new(EntityKind::Wall, 'w', 800.0, trajectory(None));
        e.spawn(&mut buf);
        assert!(!e.update(1049.0, &mut buf));
        assert!(e.update(1050.0, &mut buf));
    }

    #[test]
    fn block_owns_label_and_dispose_is_idempotent() {
        let mut buf = QuadBuffer::default();
        let mut e = ScheduledEntity::new(EntityKind::Block, 'a', 800.0, trajectory(None));
        assert!(e.capabilities().contains(Capabilities::SECONDARY_LABEL));
        e.spawn(&mut buf);
        assert_eq!(buf.live_count(), 2);
        e.dispose(&mut buf);
        assert_eq!(buf.live_count(), 0);
        e.dispose(&mut buf);
        assert_eq!(buf.live_count(), 0);
        assert!(e.done);
    }

    #[test]
    fn destructible_wall_loses_only_bottom_on_hit() {
        let mut buf = QuadBuffer::default();
        let mut e = ScheduledEntity::new(EntityKind::DestructibleWall, 's', 800.0, trajectory(None));
        e.spawn(&mut buf);
        assert_eq!(buf.live_count(), 2);
        let detach = e.hit_reaction(&mut buf);
        assert!(!detach, "multi-part wall keeps scrolling after a smash");
        assert!(!e.has_bottom_part());
        assert_eq!(buf.live_count(), 1);
        assert!(!e.done);
        e.dispose(&mut buf);
        assert_eq!(buf.live_count(), 0);
    }

    #[test]
    fn hittable_kinds_detach_and_obstacles_do_not() {
        let mut buf = QuadBuffer::default();
        for (kind, detach) in [
            (EntityKind::Block, true),
            (EntityKind::Target, true),
            (EntityKind::Monster, false),
            (EntityKind::Wall, false),
        ] {
            let mut e = ScheduledEntity::new(kind, 'x', 0.0, trajectory(None));
            e.spawn(&mut buf);
            assert_eq!(e.hit_reaction(&mut buf), detach, "{kind:?}");
            e.dispose(&mut buf);
        }
        assert_eq!(buf.live_count(), 0);
    }
}
