//! Loading and validation of settings.
//!
//! Values defined in the configuration file can be overridden by environment variables, e.g.
//! `SECAGG_ROUNDS__PER_ROUND=3`. Examples of configuration files can be found in the `configs/`
//! directory located in the repository root.

use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use secagg_core::scheme::{EccConfig, ElGamalConfig, PhaseOneMode};

#[derive(Error, Debug)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
pub struct Settings {
    #[validate]
    pub scheme: SchemeSettings,
    #[validate]
    pub rounds: RoundSettings,
    pub log: LoggingSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.merge(config::File::from(path.as_ref()))?;
        config.merge(Environment::with_prefix("secagg").separator("__"))?;
        config.try_into()
    }
}

/// The available schemes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    /// The elliptic-curve scheme.
    Ecc,
    /// The classic scheme.
    Elgamal,
}

#[derive(Debug, Validate, Deserialize, Clone)]
#[validate(schema(function = "validate_scheme"))]
/// Scheme settings.
pub struct SchemeSettings {
    /// The scheme of the protocol instance.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [scheme]
    /// kind = "ecc"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// SECAGG_SCHEME__KIND=elgamal
    /// ```
    pub kind: SchemeKind,

    /// The dimension `n` of the `n×n` weight matrices. The value must be at least `1`.
    #[validate(range(min = 1))]
    pub matrix_size: usize,

    /// The lower bound of the sampled scalars and noise.
    pub min_val: u64,

    /// The upper bound of the sampled scalars and noise. It must not be below `min_val`.
    pub max_val: u64,

    /// The bit length of the prime modulus of the classic scheme. The value must be at least
    /// `32`.
    #[serde(default = "default_prime_bits")]
    #[validate(range(min = 32))]
    pub prime_bits: usize,

    /// The generator of the classic scheme.
    #[serde(default = "default_generator")]
    #[validate(range(min = 2))]
    pub generator: u64,

    /// The number of fixed-point steps per unit of a weight in the classic scheme. The value
    /// must be at least `1`.
    #[serde(default = "default_scale")]
    #[validate(range(min = 1))]
    pub scale: u64,

    /// Whether the elliptic-curve scheme sends the private parameters of phase one in the clear.
    #[serde(default)]
    pub short_phase_one: bool,
}

fn default_prime_bits() -> usize {
    ElGamalConfig::default().prime_bits
}

fn default_generator() -> u64 {
    ElGamalConfig::default().generator
}

fn default_scale() -> u64 {
    ElGamalConfig::default().scale
}

impl SchemeSettings {
    /// Gets the configuration of the elliptic-curve scheme.
    pub fn ecc_config(&self) -> EccConfig {
        EccConfig {
            matrix_size: self.matrix_size,
            min_val: self.min_val,
            max_val: self.max_val,
            phase_one: if self.short_phase_one {
                PhaseOneMode::Short
            } else {
                PhaseOneMode::Full
            },
        }
    }

    /// Gets the configuration of the classic scheme.
    pub fn elgamal_config(&self) -> ElGamalConfig {
        ElGamalConfig {
            matrix_size: self.matrix_size,
            min_val: self.min_val,
            max_val: self.max_val,
            prime_bits: self.prime_bits,
            generator: self.generator,
            scale: self.scale,
        }
    }

    /// Checks the validity of the scalar range.
    fn validate_range(&self) -> Result<(), ValidationError> {
        if self.min_val <= self.max_val {
            Ok(())
        } else {
            Err(ValidationError::new("min_val exceeds max_val"))
        }
    }
}

fn validate_scheme(s: &SchemeSettings) -> Result<(), ValidationError> {
    s.validate_range()
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
#[validate(schema(function = "validate_rounds"))]
/// Round settings.
pub struct RoundSettings {
    /// The number of rounds to run.
    #[validate(range(min = 1))]
    pub count: u64,

    /// The number of registered participants.
    pub participants: usize,

    /// The number of participants selected for each round. The value must be at least `1` and
    /// at most `participants`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [rounds]
    /// participants = 10
    /// per_round = 5
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// SECAGG_ROUNDS__PER_ROUND=5
    /// ```
    #[validate(range(min = 1))]
    pub per_round: usize,

    /// The probability of a selected participant dropping out before submitting its weights.
    /// The value must be between `0` and `1` (i.e. `0 <= dropout < 1`).
    #[serde(default)]
    pub dropout: f64,
}

impl RoundSettings {
    /// Checks the validity of the selection and dropout settings.
    fn validate_rounds(&self) -> Result<(), ValidationError> {
        if self.per_round > self.participants {
            return Err(ValidationError::new("per_round exceeds the registered participants"));
        }
        if !(0. ..1.).contains(&self.dropout) {
            return Err(ValidationError::new("dropout must lie in [0, 1)"));
        }
        Ok(())
    }
}

fn validate_rounds(s: &RoundSettings) -> Result<(), ValidationError> {
    s.validate_rounds()
}

#[derive(Debug, Deserialize)]
/// Logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// SECAGG_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a valid tracing filter directive")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}
