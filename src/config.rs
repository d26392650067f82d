use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::color::{ChannelMapping, ColorOrder, Pixel};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub opc: OpcConfig,
    pub bus: BusConfig,
    pub strip: StripConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpcConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Tick rate of the device clock that `minclock` values are expressed in
    #[serde(default = "default_clock_frequency")]
    pub clock_frequency: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripConfig {
    #[serde(default = "default_chain_count")]
    pub chain_count: usize,
    #[serde(default)]
    pub color_order: ColorOrder,
    #[serde(default)]
    pub channel_mapping: ChannelMapping,
    pub opc_channel: u8,
    #[serde(default)]
    pub opc_offset: usize,
    #[serde(default)]
    pub initial_red: f32,
    #[serde(default)]
    pub initial_green: f32,
    #[serde(default)]
    pub initial_blue: f32,
    #[serde(default)]
    pub initial_white: f32,
}

fn default_baud_rate() -> u32 {
    1_000_000
}

fn default_clock_frequency() -> f64 {
    1_000_000.0
}

fn default_chain_count() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chain_count must be at least 1")]
    EmptyChain,
    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    InitialColorRange { name: &'static str, value: f32 },
    #[error("clock_frequency must be positive, got {0}")]
    ClockFrequency(f64),
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strip.validate()?;
        let frequency = self.bus.clock_frequency;
        if frequency.is_nan() || frequency <= 0.0 {
            return Err(ConfigError::ClockFrequency(self.bus.clock_frequency));
        }
        Ok(())
    }
}

impl StripConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_count < 1 {
            return Err(ConfigError::EmptyChain);
        }
        let channels = [
            ("initial_red", self.initial_red),
            ("initial_green", self.initial_green),
            ("initial_blue", self.initial_blue),
            ("initial_white", self.initial_white),
        ];
        for (name, value) in channels {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InitialColorRange { name, value });
            }
        }
        Ok(())
    }

    pub fn initial_pixel(&self) -> Pixel {
        Pixel::new(self.initial_red, self.initial_green, self.initial_blue, self.initial_white)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "opc": { "host": "127.0.0.1", "port": 7890 },
        "bus": { "port": "/dev/ttyUSB0", "baud_rate": 2000000, "clock_frequency": 16000000 },
        "strip": {
            "chain_count": 48,
            "color_order": "GRB",
            "channel_mapping": "named",
            "opc_channel": 1,
            "opc_offset": 4,
            "initial_red": 0.5,
            "initial_blue": 1.0
        }
    }"#;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.opc.port, 7890);
        assert_eq!(config.bus.baud_rate, 2_000_000);
        assert_eq!(config.strip.chain_count, 48);
        assert_eq!(config.strip.color_order, ColorOrder::GRB);
        assert_eq!(config.strip.channel_mapping, ChannelMapping::Named);
        assert_eq!(config.strip.initial_pixel(), Pixel::new(0.5, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse(
            r#"{"opc":{"host":"0.0.0.0","port":7890},"bus":{"port":"COM3"},"strip":{"opc_channel":0}}"#,
        )
        .unwrap();
        assert_eq!(config.bus.baud_rate, 1_000_000);
        assert_eq!(config.bus.clock_frequency, 1_000_000.0);
        assert_eq!(config.strip.chain_count, 1);
        assert_eq!(config.strip.color_order, ColorOrder::RGB);
        assert_eq!(config.strip.channel_mapping, ChannelMapping::Legacy);
        assert_eq!(config.strip.opc_offset, 0);
        assert_eq!(config.strip.initial_pixel(), Pixel::OFF);
    }

    #[test]
    fn test_rejects_empty_chain() {
        let err = Config::parse(&FULL.replace("\"chain_count\": 48", "\"chain_count\": 0")).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::EmptyChain));
    }

    #[test]
    fn test_rejects_bad_clock_frequency() {
        for bad in ["0", "-1000"] {
            let config = FULL.replace("16000000", bad);
            let err = Config::parse(&config).unwrap_err();
            assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::ClockFrequency(_))));
        }
    }

    #[test]
    fn test_color_order_is_case_insensitive() {
        let config = Config::parse(&FULL.replace("\"GRB\"", "\" grb \"")).unwrap();
        assert_eq!(config.strip.color_order, ColorOrder::GRB);

        let err = Config::parse(&FULL.replace("\"GRB\"", "\"RGBW\"")).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown color order"));
    }

    #[test]
    fn test_rejects_unknown_color_order() {
        assert!(Config::parse(&FULL.replace("\"GRB\"", "\"RGBW\"")).is_err());
        assert!(Config::parse(&FULL.replace("\"named\"", "\"fixed\"")).is_err());
    }

    #[test]
    fn test_rejects_initial_color_out_of_range() {
        let err = Config::parse(&FULL.replace("\"initial_red\": 0.5", "\"initial_red\": 1.5")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InitialColorRange { name: "initial_red", .. })
        ));
    }
}
