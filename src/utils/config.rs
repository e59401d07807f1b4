use crate::backtest::BacktestConfig;
use crate::data::{BaselineParams, Instrument, SignalKey, DEFAULT_LOOKBACK};
use crate::error::ConfigError;
use crate::strategy::regime::{default_flip_pairs, FlipPair, INI_WAIT_DAYS, MAX_WAIT_DAYS};
use crate::strategy::rebalance::InMarketCadence;
use crate::strategy::selection::{InstrumentPair, DEFAULT_EXCLUDED_SESSIONS, DEFAULT_MOMENTUM_WINDOW};
use crate::strategy::signals::{SignalUniverse, SpreadDefinition, DEFAULT_EXTREME_PERCENTILE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub universe: UniverseConfig,
    pub signal: SignalConfig,
    pub regime: RegimeConfig,
    pub selection: SelectionConfig,
    pub rebalance: RebalanceConfig,
    pub backtest: BacktestConfig,
    pub logging: LoggingConfig,
}

/// Instruments and their roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub bond_pair: InstrumentPair,
    pub equity_pair: InstrumentPair,
    /// Normalised into the benchmark equity diagnostic
    pub benchmark: Option<Instrument>,
    pub signals: Vec<Instrument>,
    pub inverted: Option<Instrument>,
    pub spreads: Vec<SpreadDefinition>,
    pub flip_pairs: Vec<FlipPair>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        let signals = SignalUniverse::default();
        Self {
            bond_pair: InstrumentPair::new("TLT", "TLH"),
            equity_pair: InstrumentPair::new("QQQ", "FDN"),
            benchmark: Some(Instrument::new("SPY")),
            signals: signals.signals,
            inverted: signals.inverted,
            spreads: signals.spreads,
            flip_pairs: default_flip_pairs(),
        }
    }
}

impl UniverseConfig {
    pub fn signal_universe(&self) -> SignalUniverse {
        SignalUniverse {
            signals: self.signals.clone(),
            spreads: self.spreads.clone(),
            inverted: self.inverted.clone(),
        }
    }

    /// Every instrument that needs a price subscription
    pub fn all_instruments(&self) -> Vec<Instrument> {
        let mut out = self.signal_universe().required_instruments();
        for pair in [&self.bond_pair, &self.equity_pair] {
            out.push(pair.primary.clone());
            out.push(pair.alternate.clone());
        }
        for flip in &self.flip_pairs {
            out.push(flip.safety.clone());
            out.push(flip.risky.clone());
        }
        out.extend(self.benchmark.iter().cloned());
        out.sort();
        out.dedup();
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Sessions retained per instrument
    pub lookback: usize,
    pub baseline_shift: usize,
    pub baseline_window: usize,
    /// Percentile (0-100) below which a reading is extreme
    pub percentile: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let baseline = BaselineParams::default();
        Self {
            lookback: DEFAULT_LOOKBACK,
            baseline_shift: baseline.shift,
            baseline_window: baseline.window,
            percentile: DEFAULT_EXTREME_PERCENTILE,
        }
    }
}

impl SignalConfig {
    pub fn baseline(&self) -> BaselineParams {
        BaselineParams {
            shift: self.baseline_shift,
            window: self.baseline_window,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub ini_wait_days: f64,
    pub max_wait_days: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            ini_wait_days: INI_WAIT_DAYS,
            max_wait_days: MAX_WAIT_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub momentum_window: usize,
    pub excluded_sessions: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            momentum_window: DEFAULT_MOMENTUM_WINDOW,
            excluded_sessions: DEFAULT_EXCLUDED_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    pub in_market_cadence: InMarketCadence,
    /// Sessions evaluated before any plan is submitted
    pub warmup_sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub output: String,
    /// Log file, used for both output formats; empty logs to stdout
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "pretty".to_string(),
            file_path: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `CONFIG_FILE` (default `config/default.toml`) layered with
    /// `INOUT__SECTION__KEY` environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_layered(Path::new(&path))
    }

    pub fn load_layered(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("INOUT").separator("__"))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let s = &self.signal;

        if s.baseline_window == 0 {
            return invalid("signal.baseline_window must be > 0".into());
        }
        if s.baseline_shift + s.baseline_window + 1 > s.lookback {
            return invalid(format!(
                "signal.lookback {} too short for baseline shift {} + window {}",
                s.lookback, s.baseline_shift, s.baseline_window
            ));
        }
        if !(0.0..=100.0).contains(&s.percentile) {
            return invalid(format!("signal.percentile {} outside [0, 100]", s.percentile));
        }
        if !(self.regime.ini_wait_days > 0.0) {
            return invalid("regime.ini_wait_days must be > 0".into());
        }
        if !(self.regime.max_wait_days >= 0.0) {
            return invalid("regime.max_wait_days must be >= 0".into());
        }
        if self.selection.momentum_window == 0 {
            return invalid("selection.momentum_window must be > 0".into());
        }
        if self.backtest.initial_capital <= Decimal::ZERO {
            return invalid("backtest.initial_capital must be > 0".into());
        }
        if self.backtest.commission_bps < Decimal::ZERO {
            return invalid("backtest.commission_bps must be >= 0".into());
        }

        let u = &self.universe;
        for (name, pair) in [("bond_pair", &u.bond_pair), ("equity_pair", &u.equity_pair)] {
            if pair.primary == pair.alternate {
                return invalid(format!("universe.{name} legs must differ"));
            }
        }

        let symbols: HashSet<SignalKey> = u.all_instruments().iter().map(SignalKey::from).collect();
        let mut spread_keys = HashSet::new();
        for spread in &u.spreads {
            if spread.long == spread.short {
                return invalid(format!("spread {} legs must differ", spread.key));
            }
            if symbols.contains(&spread.key) {
                return invalid(format!("spread key {} collides with an instrument", spread.key));
            }
            if !spread_keys.insert(spread.key.clone()) {
                return invalid(format!("duplicate spread key {}", spread.key));
            }
        }
        for flip in &u.flip_pairs {
            if flip.safety == flip.risky {
                return invalid(format!("flip pair {} legs must differ", flip.tag));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.signal.lookback, 252);
        assert_eq!(config.universe.all_instruments().len(), 15);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [regime]
            ini_wait_days = 10.0

            [rebalance]
            in_market_cadence = "daily"
            "#,
        )
        .unwrap();
        assert!((config.regime.ini_wait_days - 10.0).abs() < f64::EPSILON);
        assert!((config.regime.max_wait_days - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.rebalance.in_market_cadence, InMarketCadence::Daily);
        assert_eq!(config.universe.spreads.len(), 3);
    }

    #[test]
    fn test_universe_from_toml() {
        let config = Config::from_toml_str(
            r#"
            [universe]
            signals = ["XLI", "UUP"]
            inverted = "UUP"
            bond_pair = { primary = "IEF", alternate = "TLT" }

            [[universe.spreads]]
            key = "S_G"
            long = "SLV"
            short = "GLD"

            [[universe.flip_pairs]]
            tag = "gold_silver"
            safety = "GLD"
            risky = "SLV"
            "#,
        )
        .unwrap();
        assert_eq!(config.universe.bond_pair.primary, Instrument::new("IEF"));
        assert_eq!(config.universe.signal_universe().monitored_keys().len(), 3);
        assert_eq!(config.universe.flip_pairs.len(), 1);
    }

    #[test]
    fn test_rejects_short_lookback() {
        let err = Config::from_toml_str("[signal]\nlookback = 60\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_colliding_spread_key() {
        let mut config = Config::default();
        config.universe.spreads.push(SpreadDefinition::new("XLI", "SLV", "GLD"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_percentile() {
        let mut config = Config::default();
        config.signal.percentile = 150.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layered_env_overrides_file() {
        let path = std::env::temp_dir().join(format!("in_out_regime_layered_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[regime]\nini_wait_days = 10.0\n\n[selection]\nmomentum_window = 100\n",
        )
        .unwrap();

        // Only this test touches INOUT__* variables
        std::env::set_var("INOUT__REGIME__INI_WAIT_DAYS", "20");
        let layered = Config::load_layered(&path);

        std::env::set_var("INOUT__SIGNAL__LOOKBACK", "60");
        let invalid = Config::load_layered(&path);

        std::env::remove_var("INOUT__REGIME__INI_WAIT_DAYS");
        std::env::remove_var("INOUT__SIGNAL__LOOKBACK");
        let file_only = Config::load_layered(&path);
        let _ = std::fs::remove_file(&path);

        let layered = layered.unwrap();
        assert!((layered.regime.ini_wait_days - 20.0).abs() < f64::EPSILON);
        assert_eq!(layered.selection.momentum_window, 100);
        assert_eq!(layered.signal.lookback, 252);

        assert!(matches!(invalid, Err(ConfigError::Invalid(_))));

        let file_only = file_only.unwrap();
        assert!((file_only.regime.ini_wait_days - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("does/not/exist.toml");
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }
}
