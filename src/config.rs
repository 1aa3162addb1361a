use crate::core::input::SubstitutionTable;
use crate::game::life::{self, DamageTable};
use crate::game::timing::{DEFAULT_WINDOW_AFTER_MS, DEFAULT_WINDOW_BEFORE_MS, TimingWindows};
use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "mountainking.ini";
const DEFAULT_TIMELINE_PATH: &str = "assets/mountain_king.timeline";
const DEFAULT_SUBSTITUTIONS: &str = "q:a,w:s,e:d,r:f,u:j,i:k,o:l";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LogLevel,
    pub timeline_path: String,
    // Added to every music position (audio latency compensation).
    pub global_offset_ms: f64,
    pub window_before_ms: f64,
    pub window_after_ms: f64,
    // Silence between runs while the next difficulty is announced.
    pub gap_ms: f64,
    // Lane-width fraction travelled per second.
    pub lane_speed: f32,
    pub max_difficulty: u32,
    pub max_health: u32,
    pub damage_table: DamageTable,
    // Host ticks per second for the headless runner.
    pub tick_rate: u32,
    pub autoplay_seed: u64,
    pub substitutions: SubstitutionTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            timeline_path: DEFAULT_TIMELINE_PATH.to_string(),
            global_offset_ms: 0.0,
            window_before_ms: DEFAULT_WINDOW_BEFORE_MS,
            window_after_ms: DEFAULT_WINDOW_AFTER_MS,
            gap_ms: 4000.0,
            lane_speed: 0.35,
            max_difficulty: 3,
            max_health: life::DEFAULT_MAX_HEALTH,
            damage_table: life::default_damage_table(),
            tick_rate: 120,
            autoplay_seed: 0x4d4b,
            substitutions: SubstitutionTable::default_table(),
        }
    }
}

impl Config {
    #[inline(always)]
    pub fn timing_windows(&self) -> TimingWindows {
        TimingWindows::new(self.window_before_ms, self.window_after_ms)
    }

    /// Reads every known key, keeping the default for anything missing or invalid.
    pub fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();
        let opt = |key: &str| conf.get_from(Some("Options"), key).map(str::trim);

        let log_level = opt("LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level);
        let timeline_path = opt("TimelinePath")
            .filter(|v| !v.is_empty())
            .map_or(default.timeline_path, str::to_string);
        let global_offset_ms = opt("GlobalOffsetMs")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default.global_offset_ms);
        let window_before_ms = opt("WindowBeforeMs")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.window_before_ms);
        let window_after_ms = opt("WindowAfterMs")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.window_after_ms);
        let gap_ms = opt("GapMs")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.gap_ms);
        let lane_speed = opt("LaneSpeed")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(default.lane_speed);
        let max_difficulty = opt("MaxDifficulty")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.max_difficulty);
        let max_health = opt("MaxHealth")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default.max_health);
        let damage_table = opt("DamageTable")
            .and_then(life::parse_damage_table)
            .unwrap_or(default.damage_table);
        let tick_rate = opt("TickRate")
            .and_then(|v| v.parse::<u32>().ok())
            .map(|v| v.clamp(1, 1000))
            .unwrap_or(default.tick_rate);
        let autoplay_seed = opt("AutoplaySeed")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default.autoplay_seed);

        let substitutions = match conf.section(Some("Substitutions")) {
            Some(section) => {
                let mut table = SubstitutionTable::new();
                for (key, value) in section.iter() {
                    let Some(tier) = key
                        .strip_prefix("Tier")
                        .and_then(|n| n.trim().parse::<u32>().ok())
                    else {
                        warn!("Ignoring unknown substitution key '{key}'.");
                        continue;
                    };
                    if table.parse_tier(tier, value) == 0 {
                        warn!("No usable pairs in substitution '{key}={value}'.");
                    }
                }
                table
            }
            None => default.substitutions,
        };

        Self {
            log_level,
            timeline_path,
            global_offset_ms,
            window_before_ms,
            window_after_ms,
            gap_ms,
            lane_speed,
            max_difficulty,
            max_health,
            damage_table,
            tick_rate,
            autoplay_seed,
            substitutions,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn default_ini() -> Ini {
    let default = Config::default();
    let damage: Vec<String> = default.damage_table.iter().map(u32::to_string).collect();

    let mut conf = Ini::new();
    // [Options] section - keys in alphabetical order
    conf.with_section(Some("Options"))
        .set("AutoplaySeed", default.autoplay_seed.to_string())
        .set("DamageTable", damage.join(","))
        .set("GapMs", default.gap_ms.to_string())
        .set("GlobalOffsetMs", default.global_offset_ms.to_string())
        .set("LaneSpeed", default.lane_speed.to_string())
        .set("LogLevel", default.log_level.as_str())
        .set("MaxDifficulty", default.max_difficulty.to_string())
        .set("MaxHealth", default.max_health.to_string())
        .set("TickRate", default.tick_rate.to_string())
        .set("TimelinePath", default.timeline_path.as_str())
        .set("WindowAfterMs", default.window_after_ms.to_string())
        .set("WindowBeforeMs", default.window_before_ms.to_string());
    conf.with_section(Some("Substitutions"))
        .set("Tier0", DEFAULT_SUBSTITUTIONS);
    conf
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    default_ini().write_to_file(CONFIG_PATH)
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(CONFIG_PATH) {
        Ok(conf) => {
            let loaded = Config::from_ini(&conf);
            info!(
                "Configuration loaded from '{CONFIG_PATH}' (timeline '{}', difficulty <= {}, windows -{}/+{}ms).",
                loaded.timeline_path,
                loaded.max_difficulty,
                loaded.window_before_ms,
                loaded.window_after_ms
            );
            *CONFIG.lock().unwrap() = loaded;
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    CONFIG.lock().unwrap().clone()
}

#[cfg(test)]
mod tests {
    use super::{Config, LogLevel, default_ini};
    use ini::Ini;

    #[test]
    fn default_file_round_trips_to_defaults() {
        let cfg = Config::from_ini(&default_ini());
        let default = Config::default();
        assert_eq!(cfg.log_level, default.log_level);
        assert_eq!(cfg.timeline_path, default.timeline_path);
        assert_eq!(cfg.window_before_ms, 150.0);
        assert_eq!(cfg.window_after_ms, 250.0);
        assert_eq!(cfg.damage_table.as_slice(), &[1, 2, 4, 8]);
        assert_eq!(cfg.substitutions.resolve(0, 'q'), 'a');
    }

    #[test]
    fn invalid_values_fall_back_individually() {
        let conf = Ini::load_from_str(
            "[Options]\nLogLevel=loud\nWindowBeforeMs=-5\nWindowAfterMs=90\nDamageTable=1,x\nMaxHealth=0\n",
        )
        .expect("valid ini");
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.window_before_ms, 150.0);
        assert_eq!(cfg.window_after_ms, 90.0);
        assert_eq!(cfg.damage_table.as_slice(), &[1, 2, 4, 8]);
        assert_eq!(cfg.max_health, 30);
    }

    #[test]
    fn substitution_tiers_are_read_per_difficulty() {
        let conf = Ini::load_from_str("[Substitutions]\nTier1=x:y, z:w\nBogus=a:b\n").expect("valid ini");
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.substitutions.resolve(1, 'x'), 'y');
        assert_eq!(cfg.substitutions.resolve(1, 'z'), 'w');
        // An explicit section replaces the built-in table.
        assert_eq!(cfg.substitutions.resolve(0, 'q'), 'q');
        assert_eq!(cfg.substitutions.resolve(0, 'a'), 'a');
    }

    #[test]
    fn log_level_parsing_is_case_insensitive() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!(" warning ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("chatty".parse::<LogLevel>().is_err());
    }
}
