use glam::Vec2;

// Logical playfield, origin bottom-left, y up.
pub const SCREEN_WIDTH: f32 = 1280.0;
pub const SCREEN_HEIGHT: f32 = 720.0;

// Horizontal position of the judgment line (the player's x).
pub const JUDGE_LINE_FRACTION: f32 = 0.2;

#[inline(always)]
pub const fn screen_width() -> f32 {
    SCREEN_WIDTH
}

#[inline(always)]
pub const fn screen_height() -> f32 {
    SCREEN_HEIGHT
}

/// Converts screen fractions to logical units.
#[inline(always)]
pub fn relative(x: f32, y: f32) -> Vec2 {
    Vec2::new(x * SCREEN_WIDTH, y * SCREEN_HEIGHT)
}

#[inline(always)]
pub fn judge_line_x() -> f32 {
    SCREEN_WIDTH * JUDGE_LINE_FRACTION
}
