use crate::core::gfx::{Drawable, Renderer};
use crate::core::space;
use crate::game::entity::Trajectory;
use glam::Vec2;
use log::trace;

// ----------------------------- Animation ------------------------------
const JUMP_DURATION_MS: f64 = 520.0;
const JUMP_HEIGHT: f32 = 150.0;
const SHOOT_DURATION_MS: f64 = 180.0;
const SMASH_DURATION_MS: f64 = 300.0;
const HURT_DURATION_MS: f64 = 400.0;
const DUCK_HEIGHT_FRACTION: f32 = 0.5;

const PROJECTILE_FLIGHT_MS: f64 = 160.0;
const PROJECTILE_SIZE: Vec2 = Vec2::new(16.0, 16.0);

const DEPTH_PLAYER: f32 = 0.3;
const DEPTH_PROJECTILE: f32 = 0.2;

/// What a judged hit asks the character to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    Jump,
    Duck,
    Shoot,
    Smash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pose {
    Idle,
    Jump,
    Duck,
    Shoot,
    Smash,
    Hurt,
}

impl Pose {
    pub const fn texture(self) -> &'static str {
        match self {
            Self::Idle => "player_idle",
            Self::Jump => "player_jump",
            Self::Duck => "player_duck",
            Self::Shoot => "player_shoot",
            Self::Smash => "player_smash",
            Self::Hurt => "player_hurt",
        }
    }

    /// None for poses that last until something else ends them.
    const fn duration_ms(self) -> Option<f64> {
        match self {
            Self::Idle | Self::Duck => None,
            Self::Jump => Some(JUMP_DURATION_MS),
            Self::Shoot => Some(SHOOT_DURATION_MS),
            Self::Smash => Some(SMASH_DURATION_MS),
            Self::Hurt => Some(HURT_DURATION_MS),
        }
    }
}

impl From<PlayerAction> for Pose {
    fn from(action: PlayerAction) -> Self {
        match action {
            PlayerAction::Jump => Self::Jump,
            PlayerAction::Duck => Self::Duck,
            PlayerAction::Shoot => Self::Shoot,
            PlayerAction::Smash => Self::Smash,
        }
    }
}

/// Straight-line shot toward where its target will be on arrival.
#[derive(Clone, Debug)]
pub struct Projectile {
    pub from: Vec2,
    pub to: Vec2,
    pub fired_ms: f64,
    pub arrive_ms: f64,
    drawable: Option<Drawable>,
}

impl Projectile {
    /// Center position at `music_ms`, clamped to the flight.
    pub fn position_at(&self, music_ms: f64) -> Vec2 {
        let span = (self.arrive_ms - self.fired_ms).max(f64::EPSILON);
        let t = ((music_ms - self.fired_ms) / span).clamp(0.0, 1.0) as f32;
        self.from.lerp(self.to, t)
    }

    #[inline(always)]
    pub fn has_arrived(&self, music_ms: f64) -> bool {
        music_ms >= self.arrive_ms
    }
}

pub struct Player {
    pose: Pose,
    pose_started_ms: f64,
    /// Bottom-left while standing.
    base: Vec2,
    size: Vec2,
    body: Option<Drawable>,
    projectiles: Vec<Projectile>,
}

impl Player {
    pub fn new() -> Self {
        let size = Vec2::new(80.0, 120.0);
        Self {
            pose: Pose::Idle,
            pose_started_ms: 0.0,
            base: Vec2::new(space::judge_line_x() - size.x, space::screen_height() * 0.1),
            size,
            body: None,
            projectiles: Vec::new(),
        }
    }

    #[inline(always)]
    pub const fn pose(&self) -> Pose {
        self.pose
    }

    #[inline(always)]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Muzzle point shots leave from.
    #[inline(always)]
    pub fn muzzle(&self) -> Vec2 {
        self.base + Vec2::new(self.size.x, self.size.y * 0.6)
    }

    fn set_pose(&mut self, pose: Pose, music_ms: f64, renderer: &mut dyn Renderer) {
        if pose != self.pose || self.body.is_none() {
            if let Some(body) = self.body.take() {
                renderer.release(body);
            }
            self.body = Some(renderer.quad(pose.texture(), DEPTH_PLAYER));
        }
        trace!("Player pose {:?} -> {pose:?} at {music_ms:.1}ms", self.pose);
        self.pose = pose;
        self.pose_started_ms = music_ms;
    }

    /// Vertical offset from the jump arc; zero outside a jump.
    pub fn lift_at(&self, music_ms: f64) -> f32 {
        if self.pose != Pose::Jump {
            return 0.0;
        }
        let p = ((music_ms - self.pose_started_ms) / JUMP_DURATION_MS).clamp(0.0, 1.0) as f32;
        JUMP_HEIGHT * 4.0 * p * (1.0 - p)
    }

    /// Reacts to a hit. `target` is the judged entity's motion, used to aim shots.
    pub fn perform(
        &mut self,
        action: PlayerAction,
        target: Option<&Trajectory>,
        music_ms: f64,
        renderer: &mut dyn Renderer,
    ) {
        self.set_pose(action.into(), music_ms, renderer);
        if action == PlayerAction::Shoot
            && let Some(target) = target
        {
            self.fire(target, music_ms, renderer);
        }
    }

    fn fire(&mut self, target: &Trajectory, music_ms: f64, renderer: &mut dyn Renderer) {
        let arrive_ms = music_ms + PROJECTILE_FLIGHT_MS;
        let projectile = Projectile {
            from: self.muzzle(),
            to: target.center_at(arrive_ms),
            fired_ms: music_ms,
            arrive_ms,
            drawable: Some(renderer.quad("projectile", DEPTH_PROJECTILE)),
        };
        self.projectiles.push(projectile);
    }

    /// Key-up ends a duck.
    pub fn release_duck(&mut self, music_ms: f64, renderer: &mut dyn Renderer) {
        if self.pose == Pose::Duck {
            self.set_pose(Pose::Idle, music_ms, renderer);
        }
    }

    pub fn hurt(&mut self, music_ms: f64, renderer: &mut dyn Renderer) {
        self.set_pose(Pose::Hurt, music_ms, renderer);
    }

    pub fn update(&mut self, music_ms: f64, renderer: &mut dyn Renderer) {
        if self.body.is_none() {
            self.set_pose(Pose::Idle, music_ms, renderer);
        }
        if let Some(duration) = self.pose.duration_ms()
            && music_ms - self.pose_started_ms >= duration
        {
            self.set_pose(Pose::Idle, music_ms, renderer);
        }

        let height = if self.pose == Pose::Duck {
            self.size.y * DUCK_HEIGHT_FRACTION
        } else {
            self.size.y
        };
        let bl = self.base + Vec2::new(0.0, self.lift_at(music_ms));
        if let Some(body) = self.body {
            renderer.draw_rect(body, bl, bl + Vec2::new(self.size.x, height));
        }

        self.projectiles.retain_mut(|p| {
            if p.has_arrived(music_ms) {
                if let Some(d) = p.drawable.take() {
                    renderer.release(d);
                }
                return false;
            }
            if let Some(d) = p.drawable {
                let center = p.position_at(music_ms);
                let half = PROJECTILE_SIZE * 0.5;
                renderer.draw_rect(d, center - half, center + half);
            }
            true
        });
    }

    pub fn dispose(&mut self, renderer: &mut dyn Renderer) {
        if let Some(body) = self.body.take() {
            renderer.release(body);
        }
        for p in &mut self.projectiles {
            if let Some(d) = p.drawable.take() {
                renderer.release(d);
            }
        }
        self.projectiles.clear();
        self.pose = Pose::Idle;
        self.pose_started_ms = 0.0;
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{JUMP_DURATION_MS, JUMP_HEIGHT, PROJECTILE_FLIGHT_MS, Player, PlayerAction, Pose};
    use crate::core::gfx::QuadBuffer;
    use crate::game::entity::{Oscillation, Trajectory};
    use glam::Vec2;

    #[test]
    fn jump_arc_peaks_halfway_and_lands() {
        let mut buf = QuadBuffer::default();
        let mut player = Player::new();
        player.perform(PlayerAction::Jump, None, 1000.0, &mut buf);
        let peak = player.lift_at(1000.0 + JUMP_DURATION_MS / 2.0);
        assert!((peak - JUMP_HEIGHT).abs() < 1e-3, "peak {peak}");
        assert_eq!(player.lift_at(1000.0), 0.0);
        player.update(1000.0 + JUMP_DURATION_MS, &mut buf);
        assert_eq!(player.pose(), Pose::Idle);
    }

    #[test]
    fn duck_lasts_until_key_up() {
        let mut buf = QuadBuffer::default();
        let mut player = Player::new();
        player.perform(PlayerAction::Duck, None, 0.0, &mut buf);
        player.update(10_000.0, &mut buf);
        assert_eq!(player.pose(), Pose::Duck);
        player.release_duck(10_010.0, &mut buf);
        assert_eq!(player.pose(), Pose::Idle);
    }

    #[test]
    fn shot_lands_on_predicted_center_of_oscillating_target() {
        let mut buf = QuadBuffer::default();
        let mut player = Player::new();
        let target = Trajectory {
            origin: Vec2::new(900.0, 300.0),
            size: Vec2::new(56.0, 56.0),
            spawn_ms: 0.0,
            speed: 0.4,
            oscillation: Some(Oscillation::DEFAULT),
        };
        player.perform(PlayerAction::Shoot, Some(&target), 500.0, &mut buf);
        let shot = &player.projectiles()[0];
        let arrival = 500.0 + PROJECTILE_FLIGHT_MS;
        let miss = shot.position_at(arrival) - target.center_at(arrival);
        assert!(miss.length() < 1e-3, "landed {miss:?} away from the target center");
        assert_eq!(shot.position_at(500.0), player.muzzle());
    }

    #[test]
    fn projectiles_release_on_arrival_and_dispose_clears_all() {
        let mut buf = QuadBuffer::default();
        let mut player = Player::new();
        let target = Trajectory {
            origin: Vec2::new(900.0, 100.0),
            size: Vec2::new(64.0, 64.0),
            spawn_ms: 0.0,
            speed: 0.4,
            oscillation: None,
        };
        player.update(0.0, &mut buf);
        player.perform(PlayerAction::Shoot, Some(&target), 100.0, &mut buf);
        assert_eq!(buf.live_count(), 2);
        player.update(100.0 + PROJECTILE_FLIGHT_MS, &mut buf);
        assert!(player.projectiles().is_empty());
        assert_eq!(buf.live_count(), 1);
        player.perform(PlayerAction::Shoot, Some(&target), 400.0, &mut buf);
        player.dispose(&mut buf);
        assert_eq!(buf.live_count(), 0);
    }
}
