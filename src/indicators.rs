//! Indicator parameter schema
//!
//! Static table of the named integer parameters each indicator accepts, and
//! [`IndicatorSpec`], an indicator together with concrete values for exactly
//! its own parameters.

use std::fmt;

use crate::error::ValidationError;
use crate::types::Indicator;

/// Smallest accepted value for any indicator parameter
pub const MIN_PARAM: u32 = 1;

/// Largest accepted value for any indicator parameter
pub const MAX_PARAM: u32 = 200;

/// Parameter names and defaults for an indicator, in display order.
///
/// Empty for price and volume, which take no parameters.
pub fn default_params(indicator: Indicator) -> &'static [(&'static str, u32)] {
    match indicator {
        Indicator::Rsi => &[("period", 14)],
        Indicator::Macd => &[("fast_period", 12), ("slow_period", 26), ("signal_period", 9)],
        Indicator::Sma => &[("period", 20)],
        Indicator::Ema => &[("period", 20)],
        Indicator::BollingerBands => &[("period", 20), ("upper_band", 2), ("lower_band", 2)],
        Indicator::Stochastic => &[("k_period", 14), ("d_period", 3)],
        Indicator::WilliamsR => &[("period", 14)],
        Indicator::Atr => &[("period", 14)],
        Indicator::Volume | Indicator::Close => &[],
    }
}

/// Which side of a condition a parameter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSide {
    Primary,
    Compare,
}

/// An indicator with its own parameters and nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSpec {
    Rsi {
        period: u32,
    },
    Macd {
        fast_period: u32,
        slow_period: u32,
        signal_period: u32,
    },
    Sma {
        period: u32,
    },
    Ema {
        period: u32,
    },
    BollingerBands {
        period: u32,
        upper_band: u32,
        lower_band: u32,
    },
    Stochastic {
        k_period: u32,
        d_period: u32,
    },
    WilliamsR {
        period: u32,
    },
    Atr {
        period: u32,
    },
    Volume,
    Close,
}

impl IndicatorSpec {
    pub fn with_defaults(indicator: Indicator) -> Self {
        match indicator {
            Indicator::Rsi => IndicatorSpec::Rsi { period: 14 },
            Indicator::Macd => IndicatorSpec::Macd {
                fast_period: 12,
                slow_period: 26,
                signal_period: 9,
            },
            Indicator::Sma => IndicatorSpec::Sma { period: 20 },
            Indicator::Ema => IndicatorSpec::Ema { period: 20 },
            Indicator::BollingerBands => IndicatorSpec::BollingerBands {
                period: 20,
                upper_band: 2,
                lower_band: 2,
            },
            Indicator::Stochastic => IndicatorSpec::Stochastic {
                k_period: 14,
                d_period: 3,
            },
            Indicator::WilliamsR => IndicatorSpec::WilliamsR { period: 14 },
            Indicator::Atr => IndicatorSpec::Atr { period: 14 },
            Indicator::Volume => IndicatorSpec::Volume,
            Indicator::Close => IndicatorSpec::Close,
        }
    }

    /// Build from a parameter lookup, falling back to defaults for anything
    /// the lookup does not provide. Names outside the indicator's schema are
    /// never consulted.
    pub fn from_lookup(indicator: Indicator, lookup: impl Fn(&str) -> Option<u32>) -> Self {
        let mut spec = IndicatorSpec::with_defaults(indicator);
        for (name, _) in default_params(indicator) {
            if let (Some(value), Some(slot)) = (lookup(*name), spec.slot_mut(*name)) {
                *slot = value;
            }
        }
        spec
    }

    pub fn indicator(&self) -> Indicator {
        match self {
            IndicatorSpec::Rsi { .. } => Indicator::Rsi,
            IndicatorSpec::Macd { .. } => Indicator::Macd,
            IndicatorSpec::Sma { .. } => Indicator::Sma,
            IndicatorSpec::Ema { .. } => Indicator::Ema,
            IndicatorSpec::BollingerBands { .. } => Indicator::BollingerBands,
            IndicatorSpec::Stochastic { .. } => Indicator::Stochastic,
            IndicatorSpec::WilliamsR { .. } => Indicator::WilliamsR,
            IndicatorSpec::Atr { .. } => Indicator::Atr,
            IndicatorSpec::Volume => Indicator::Volume,
            IndicatorSpec::Close => Indicator::Close,
        }
    }

    /// Current parameter values in schema order
    pub fn params(&self) -> Vec<(&'static str, u32)> {
        default_params(self.indicator())
            .iter()
            .filter_map(|(name, _)| self.param(*name).map(|value| (*name, value)))
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<u32> {
        let mut copy = *self;
        copy.slot_mut(name).map(|slot| *slot)
    }

    /// Set one parameter, rejecting names outside this indicator's schema and
    /// values outside [`MIN_PARAM`]..=[`MAX_PARAM`]
    pub fn set_param(&mut self, name: &str, value: u32) -> Result<(), ValidationError> {
        check_param(name, value)?;
        let indicator = self.indicator();
        let slot = self
            .slot_mut(name)
            .ok_or_else(|| ValidationError::UnknownParameter {
                indicator,
                name: name.to_string(),
            })?;
        *slot = value;
        Ok(())
    }

    /// Check every parameter against the accepted range
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.params()
            .into_iter()
            .try_for_each(|(name, value)| check_param(name, value))
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut u32> {
        let slot = match (self, name) {
            (
                IndicatorSpec::Rsi { period }
                | IndicatorSpec::Sma { period }
                | IndicatorSpec::Ema { period }
                | IndicatorSpec::WilliamsR { period }
                | IndicatorSpec::Atr { period }
                | IndicatorSpec::BollingerBands { period, .. },
                "period",
            ) => period,
            (IndicatorSpec::Macd { fast_period, .. }, "fast_period") => fast_period,
            (IndicatorSpec::Macd { slow_period, .. }, "slow_period") => slow_period,
            (IndicatorSpec::Macd { signal_period, .. }, "signal_period") => signal_period,
            (IndicatorSpec::BollingerBands { upper_band, .. }, "upper_band") => upper_band,
            (IndicatorSpec::BollingerBands { lower_band, .. }, "lower_band") => lower_band,
            (IndicatorSpec::Stochastic { k_period, .. }, "k_period") => k_period,
            (IndicatorSpec::Stochastic { d_period, .. }, "d_period") => d_period,
            _ => return None,
        };
        Some(slot)
    }
}

impl From<Indicator> for IndicatorSpec {
    fn from(indicator: Indicator) -> Self {
        IndicatorSpec::with_defaults(indicator)
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params();
        if params.is_empty() {
            return f.write_str(self.indicator().label());
        }
        let values: Vec<String> = params.iter().map(|(_, v)| v.to_string()).collect();
        write!(f, "{}({})", self.indicator().label(), values.join(","))
    }
}

fn check_param(name: &str, value: u32) -> Result<(), ValidationError> {
    if !(MIN_PARAM..=MAX_PARAM).contains(&value) {
        return Err(ValidationError::ParameterOutOfRange {
            name: name.to_string(),
            value,
            min: MIN_PARAM,
            max: MAX_PARAM,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_defaults() {
        assert_eq!(default_params(Indicator::Rsi), &[("period", 14)]);
        assert_eq!(
            default_params(Indicator::Macd),
            &[("fast_period", 12), ("slow_period", 26), ("signal_period", 9)]
        );
        assert_eq!(
            default_params(Indicator::BollingerBands),
            &[("period", 20), ("upper_band", 2), ("lower_band", 2)]
        );
        assert_eq!(default_params(Indicator::Stochastic), &[("k_period", 14), ("d_period", 3)]);
        assert!(default_params(Indicator::Close).is_empty());
        assert!(default_params(Indicator::Volume).is_empty());
    }

    #[test]
    fn test_spec_defaults_match_schema() {
        for indicator in Indicator::ALL {
            let spec = IndicatorSpec::with_defaults(indicator);
            assert_eq!(spec.indicator(), indicator);
            assert_eq!(spec.params(), default_params(indicator).to_vec());
        }
    }

    #[test]
    fn test_set_param_in_schema() {
        let mut spec = IndicatorSpec::with_defaults(Indicator::Macd);
        spec.set_param("slow_period", 30).unwrap();
        assert_eq!(spec.param("slow_period"), Some(30));
        assert_eq!(spec.param("fast_period"), Some(12));
    }

    #[test]
    fn test_set_param_rejects_foreign_name() {
        let mut spec = IndicatorSpec::with_defaults(Indicator::Macd);
        let err = spec.set_param("period", 10).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownParameter { indicator: Indicator::Macd, .. }));
    }

    #[test]
    fn test_set_param_rejects_out_of_range() {
        let mut spec = IndicatorSpec::with_defaults(Indicator::Rsi);
        assert!(spec.set_param("period", 0).is_err());
        assert!(spec.set_param("period", 201).is_err());
        assert_eq!(spec.param("period"), Some(14));
        spec.set_param("period", 200).unwrap();
        assert_eq!(spec.param("period"), Some(200));
    }

    #[test]
    fn test_from_lookup_ignores_foreign_names() {
        let spec = IndicatorSpec::from_lookup(Indicator::Stochastic, |name| match name {
            "k_period" => Some(21),
            "period" => Some(99),
            _ => None,
        });
        assert_eq!(
            spec,
            IndicatorSpec::Stochastic {
                k_period: 21,
                d_period: 3
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(IndicatorSpec::with_defaults(Indicator::Rsi).to_string(), "RSI(14)");
        assert_eq!(IndicatorSpec::with_defaults(Indicator::Macd).to_string(), "MACD(12,26,9)");
        assert_eq!(IndicatorSpec::Close.to_string(), "Price");
    }
}
