use glam::Vec2;
use log::trace;

/// Handle to a persistent quad owned by a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Drawable(u32);

impl Drawable {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// --- Public Data Contract ---
// Gameplay only ever talks to this trait; the window/GPU side lives elsewhere.
pub trait Renderer {
    /// Allocates a textured quad from the atlas region named `texture`.
    fn quad(&mut self, texture: &str, depth: f32) -> Drawable;
    /// Allocates a single-glyph text quad.
    fn letter_glyph(&mut self, symbol: char, depth: f32) -> Drawable;
    fn draw_rect(&mut self, drawable: Drawable, bottom_left: Vec2, top_right: Vec2);
    fn set_alpha(&mut self, drawable: Drawable, alpha: f32);
    /// Releasing an unknown or already released handle is a no-op.
    fn release(&mut self, drawable: Drawable);
}

#[derive(Clone, Debug, PartialEq)]
pub enum QuadSource {
    Texture(String),
    Glyph(char),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Quad {
    pub source: QuadSource,
    pub depth: f32,
    pub bottom_left: Vec2,
    pub top_right: Vec2,
    pub alpha: f32,
}

impl Quad {
    #[inline(always)]
    pub const fn is_glyph(&self) -> bool {
        matches!(self.source, QuadSource::Glyph(_))
    }

    /// Would cover at least one pixel.
    #[inline(always)]
    pub fn is_visible(&self) -> bool {
        self.alpha > 0.0 && self.top_right.x > self.bottom_left.x && self.top_right.y > self.bottom_left.y
    }
}

/// Slab of quads with slot reuse. Used headless and as the CPU-side staging
/// buffer a GPU backend would upload from.
#[derive(Debug, Default)]
pub struct QuadBuffer {
    slots: Vec<Option<Quad>>,
    free: Vec<u32>,
    live: usize,
}

impl QuadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    #[inline(always)]
    pub const fn live_count(&self) -> usize {
        self.live
    }

    #[cfg(test)]
    pub fn get(&self, drawable: Drawable) -> Option<&Quad> {
        self.slots.get(drawable.index()).and_then(Option::as_ref)
    }

    /// Visible quads back to front (larger depth first), in the order a
    /// backend would submit them.
    pub fn draw_list(&self) -> Vec<&Quad> {
        let mut list: Vec<&Quad> = self.slots.iter().flatten().filter(|q| q.is_visible()).collect();
        list.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        list
    }

    fn alloc(&mut self, source: QuadSource, depth: f32) -> Drawable {
        let quad = Quad {
            source,
            depth,
            bottom_left: Vec2::ZERO,
            top_right: Vec2::ZERO,
            alpha: 1.0,
        };
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(quad);
            return Drawable(idx);
        }
        self.slots.push(Some(quad));
        Drawable((self.slots.len() - 1) as u32)
    }
}

impl Renderer for QuadBuffer {
    fn quad(&mut self, texture: &str, depth: f32) -> Drawable {
        self.alloc(QuadSource::Texture(texture.to_string()), depth)
    }

    fn letter_glyph(&mut self, symbol: char, depth: f32) -> Drawable {
        self.alloc(QuadSource::Glyph(symbol), depth)
    }

    fn draw_rect(&mut self, drawable: Drawable, bottom_left: Vec2, top_right: Vec2) {
        if let Some(Some(quad)) = self.slots.get_mut(drawable.index()) {
            quad.bottom_left = bottom_left;
            quad.top_right = top_right;
        }
    }

    fn set_alpha(&mut self, drawable: Drawable, alpha: f32) {
        if let Some(Some(quad)) = self.slots.get_mut(drawable.index()) {
            quad.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn release(&mut self, drawable: Drawable) {
        let released = self
            .slots
            .get_mut(drawable.index())
            .and_then(Option::take)
            .is_some();
        if released {
            self.free.push(drawable.0);
            self.live -= 1;
        } else {
            trace!("release of stale drawable {drawable:?} ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{QuadBuffer, QuadSource, Renderer};
    use glam::Vec2;

    #[test]
    fn release_is_idempotent() {
        let mut buf = QuadBuffer::default();
        let q = buf.quad("block", 0.5);
        assert_eq!(buf.live_count(), 1);
        buf.release(q);
        buf.release(q);
        assert_eq!(buf.live_count(), 0);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut buf = QuadBuffer::default();
        let a = buf.quad("block", 0.5);
        buf.release(a);
        let b = buf.letter_glyph('x', 0.4);
        assert_eq!(a, b);
        assert_eq!(buf.get(b).map(|q| q.source.clone()), Some(QuadSource::Glyph('x')));
    }

    #[test]
    fn draw_rect_updates_vertices() {
        let mut buf = QuadBuffer::default();
        let q = buf.quad("wall", 0.5);
        buf.draw_rect(q, Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        let quad = buf.get(q).expect("quad is live");
        assert_eq!(quad.bottom_left, Vec2::new(1.0, 2.0));
        assert_eq!(quad.top_right, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn draw_list_is_back_to_front_and_skips_hidden() {
        let mut buf = QuadBuffer::default();
        let near = buf.letter_glyph('a', 0.1);
        let far = buf.quad("wall", 0.9);
        let hidden = buf.quad("block", 0.5);
        // Never sized, so it covers nothing.
        buf.quad("block", 0.4);
        for d in [near, far, hidden] {
            buf.draw_rect(d, Vec2::ZERO, Vec2::new(10.0, 10.0));
        }
        buf.set_alpha(hidden, 0.0);

        let list = buf.draw_list();
        let depths: Vec<f32> = list.iter().map(|q| q.depth).collect();
        assert_eq!(depths, vec![0.9, 0.1]);
        assert!(list[1].is_glyph());
        assert!(!list[0].is_glyph());
    }
}
