use smallvec::SmallVec;

pub const DEFAULT_MAX_HEALTH: u32 = 30;
// Damage for the 1st, 2nd, 3rd and 4th-or-later consecutive miss.
pub const DEFAULT_DAMAGE_TABLE: [u32; 4] = [1, 2, 4, 8];

pub type DamageTable = SmallVec<[u32; 8]>;

pub fn default_damage_table() -> DamageTable {
    SmallVec::from_slice(&DEFAULT_DAMAGE_TABLE)
}

/// Parses `1,2,4,8`. Returns None when empty or any entry is not a number.
pub fn parse_damage_table(s: &str) -> Option<DamageTable> {
    let table: Option<DamageTable> = s
        .split(',')
        .map(|v| v.trim().parse::<u32>().ok())
        .collect();
    table.filter(|t| !t.is_empty())
}

#[derive(Clone, Debug)]
pub struct Health {
    current: u32,
    max: u32,
    miss_streak: usize,
    damage_table: DamageTable,
}

impl Health {
    pub fn new(max: u32, damage_table: DamageTable) -> Self {
        let damage_table = if damage_table.is_empty() {
            default_damage_table()
        } else {
            damage_table
        };
        Self {
            current: max,
            max,
            miss_streak: 0,
            damage_table,
        }
    }

    #[inline(always)]
    pub const fn current(&self) -> u32 {
        self.current
    }

    #[inline(always)]
    pub const fn max(&self) -> u32 {
        self.max
    }

    #[inline(always)]
    pub const fn miss_streak(&self) -> usize {
        self.miss_streak
    }

    #[inline(always)]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Fraction for a health bar.
    #[inline(always)]
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        self.current as f32 / self.max as f32
    }

    /// Any hit ends the miss streak.
    pub fn on_hit(&mut self) {
        self.miss_streak = 0;
    }

    /// Applies streak damage and returns the amount taken.
    pub fn on_miss(&mut self) -> u32 {
        let idx = self.miss_streak.min(self.damage_table.len() - 1);
        let damage = self.damage_table[idx];
        self.miss_streak += 1;
        self.current = self.current.saturating_sub(damage);
        damage
    }

    pub fn reset(&mut self) {
        self.current = self.max;
        self.miss_streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Health, default_damage_table, parse_damage_table};

    #[test]
    fn three_consecutive_misses_cost_one_two_four() {
        let mut h = Health::new(30, default_damage_table());
        h.on_miss();
        h.on_miss();
        h.on_miss();
        assert_eq!(h.current(), 30 - 7);
    }

    #[test]
    fn hit_resets_streak() {
        let mut h = Health::new(30, default_damage_table());
        assert_eq!(h.on_miss(), 1);
        assert_eq!(h.on_miss(), 2);
        h.on_hit();
        assert_eq!(h.on_miss(), 1);
        assert_eq!(h.current(), 26);
    }

    #[test]
    fn damage_caps_at_last_table_entry() {
        let mut h = Health::new(100, default_damage_table());
        let taken: Vec<u32> = (0..6).map(|_| h.on_miss()).collect();
        assert_eq!(taken, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn health_saturates_at_zero() {
        let mut h = Health::new(5, default_damage_table());
        for _ in 0..4 {
            h.on_miss();
        }
        assert!(h.is_depleted());
        assert_eq!(h.current(), 0);
    }

    #[test]
    fn damage_table_parsing() {
        assert_eq!(parse_damage_table("1, 3,9").map(|t| t.to_vec()), Some(vec![1, 3, 9]));
        assert!(parse_damage_table("1,x").is_none());
        assert!(parse_damage_table("").is_none());
    }
}
