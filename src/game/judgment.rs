use crate::core::gfx::Renderer;
use crate::game::entity::{EntityKind, Trajectory};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JudgeKind {
    Hit,
    /// Expired or scrolled away without an accepted press.
    Miss,
    /// A press that found an open entity for its key but failed the timing check.
    MissPress,
}

#[derive(Clone, Debug)]
pub struct Judgment {
    pub kind: JudgeKind,
    pub lane: usize,
    pub symbol: char,
    pub entity_kind: Option<EntityKind>,
    /// Signed: negative means early.
    pub time_error_ms: f64,
    pub judged_at_ms: f64,
    /// Motion of the judged entity, so reactions can aim at it.
    pub trajectory: Option<Trajectory>,
}

/// Everything a lane needs for one tick or one press: the settled music
/// position, the renderer, and where to report judgments.
pub struct TickContext<'a> {
    pub music_ms: f64,
    pub renderer: &'a mut dyn Renderer,
    pub judgments: &'a mut Vec<Judgment>,
}

impl<'a> TickContext<'a> {
    pub fn new(music_ms: f64, renderer: &'a mut dyn Renderer, judgments: &'a mut Vec<Judgment>) -> Self {
        Self {
            music_ms,
            renderer,
            judgments,
        }
    }

    #[inline(always)]
    pub fn report(&mut self, judgment: Judgment) {
        self.judgments.push(judgment);
    }
}
