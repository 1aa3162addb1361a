use rustc_hash::FxHashMap;
use smallvec::SmallVec;

pub const KEY_ESCAPE: u32 = 27;
pub const KEY_RETURN: u32 = 13;

/// Raw key code as delivered by the windowing layer: the unicode scalar of
/// the key when it has one, otherwise a platform code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction {
    /// Toggle the pause menu.
    Menu,
    /// Confirm the highlighted menu entry (replay on the retry menu).
    Confirm,
    Symbol(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub action: InputAction,
    pub pressed: bool,
}

#[inline(always)]
pub fn map_key_code(code: KeyCode, pressed: bool) -> Option<InputEvent> {
    let action = match code.0 {
        KEY_ESCAPE => InputAction::Menu,
        KEY_RETURN => InputAction::Confirm,
        raw => {
            let ch = char::from_u32(raw)?;
            if ch.is_control() {
                return None;
            }
            InputAction::Symbol(ch.to_ascii_lowercase())
        }
    };
    Some(InputEvent { action, pressed })
}

/// Per-difficulty symbol aliases. Easier tiers fold several note symbols
/// onto one key; anything unmapped keeps its own symbol.
#[derive(Clone, Debug, Default)]
pub struct SubstitutionTable {
    tiers: Vec<FxHashMap<char, char>>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tier: u32, from: char, to: char) {
        let tier = tier as usize;
        if self.tiers.len() <= tier {
            self.tiers.resize_with(tier + 1, FxHashMap::default);
        }
        self.tiers[tier].insert(from, to);
    }

    #[inline(always)]
    pub fn resolve(&self, tier: u32, symbol: char) -> char {
        self.tiers
            .get(tier as usize)
            .and_then(|map| map.get(&symbol))
            .copied()
            .unwrap_or(symbol)
    }

    /// Parses `q:a,w:s` pairs for one tier. Malformed pairs are skipped.
    pub fn parse_tier(&mut self, tier: u32, spec: &str) -> usize {
        let mut applied = 0;
        for pair in spec.split(',') {
            let Some((from, to)) = pair.split_once(':') else {
                continue;
            };
            let from: SmallVec<[char; 2]> = from.trim().chars().collect();
            let to: SmallVec<[char; 2]> = to.trim().chars().collect();
            if let ([from], [to]) = (from.as_slice(), to.as_slice()) {
                self.set(tier, *from, *to);
                applied += 1;
            }
        }
        applied
    }

    /// Easy tier folds the upper letter row onto the home row.
    pub fn default_table() -> Self {
        let mut table = Self::new();
        for (from, to) in [('q', 'a'), ('w', 's'), ('e', 'd'), ('r', 'f'), ('u', 'j'), ('i', 'k'), ('o', 'l')] {
            table.set(0, from, to);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::{InputAction, KEY_ESCAPE, KeyCode, SubstitutionTable, map_key_code};

    #[test]
    fn letters_map_to_lowercase_symbols() {
        let ev = map_key_code(KeyCode('A' as u32), true).expect("letter maps");
        assert_eq!(ev.action, InputAction::Symbol('a'));
        assert!(ev.pressed);
    }

    #[test]
    fn escape_maps_to_menu_and_controls_are_dropped() {
        assert_eq!(
            map_key_code(KeyCode(KEY_ESCAPE), true).map(|e| e.action),
            Some(InputAction::Menu)
        );
        assert!(map_key_code(KeyCode(8), true).is_none());
    }

    #[test]
    fn unmapped_symbol_falls_back_to_raw() {
        let table = SubstitutionTable::default_table();
        assert_eq!(table.resolve(0, 'q'), 'a');
        assert_eq!(table.resolve(0, 'z'), 'z');
        assert_eq!(table.resolve(1, 'q'), 'q');
        assert_eq!(table.resolve(99, 'q'), 'q');
    }

    #[test]
    fn parse_tier_skips_malformed_pairs() {
        let mut table = SubstitutionTable::new();
        let applied = table.parse_tier(2, "x:y, bad, ab:c ,m:n");
        assert_eq!(applied, 2);
        assert_eq!(table.resolve(2, 'x'), 'y');
        assert_eq!(table.resolve(2, 'm'), 'n');
        assert_eq!(table.resolve(2, 'a'), 'a');
    }
}
