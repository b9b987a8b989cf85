//! Exit policy model
//!
//! An [`ExitCondition`] decides how an open position is closed. The JSON form
//! is tagged by `type`; each variant carries only the fields it needs, so
//! fields left over from another exit type can never be read or validated.
//!
//! Stored policies are often incomplete: the editor writes the new `type`
//! before its fields, and an emptied input is saved as `null`. Missing or
//! unreadable fields decode to the defaults of [`ExitCondition::default_for`];
//! [`ExitCondition::validate`] is what rejects bad values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::lenient;
use crate::types::{Indicator, Operator, TimeUnit};

/// Largest percentage accepted for profit target, stop loss and trailing stop
pub const MAX_EXIT_PERCENT: f64 = 50.0;

/// Exit policy kind, the `type` discriminator on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    Manual,
    ProfitTarget,
    StopLoss,
    TrailingStop,
    TimeBased,
    IndicatorBased,
}

impl ExitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitType::Manual => "manual",
            ExitType::ProfitTarget => "profit_target",
            ExitType::StopLoss => "stop_loss",
            ExitType::TrailingStop => "trailing_stop",
            ExitType::TimeBased => "time_based",
            ExitType::IndicatorBased => "indicator_based",
        }
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an open position is closed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "ExitDocument")]
pub enum ExitCondition {
    /// Exit when the entry conditions reverse
    #[default]
    Manual,
    ProfitTarget {
        value: f64,
    },
    StopLoss {
        value: f64,
    },
    TrailingStop {
        value: f64,
    },
    TimeBased {
        #[serde(rename = "timePeriod")]
        time_period: u32,
        #[serde(rename = "timeUnit")]
        time_unit: TimeUnit,
    },
    IndicatorBased {
        indicator: Indicator,
        operator: Operator,
        #[serde(rename = "indicatorValue")]
        indicator_value: String,
    },
}

impl ExitCondition {
    pub fn kind(&self) -> ExitType {
        match self {
            ExitCondition::Manual => ExitType::Manual,
            ExitCondition::ProfitTarget { .. } => ExitType::ProfitTarget,
            ExitCondition::StopLoss { .. } => ExitType::StopLoss,
            ExitCondition::TrailingStop { .. } => ExitType::TrailingStop,
            ExitCondition::TimeBased { .. } => ExitType::TimeBased,
            ExitCondition::IndicatorBased { .. } => ExitType::IndicatorBased,
        }
    }

    /// Percentage carried by the percentage-based variants
    pub fn percent(&self) -> Option<f64> {
        match self {
            ExitCondition::ProfitTarget { value }
            | ExitCondition::StopLoss { value }
            | ExitCondition::TrailingStop { value } => Some(*value),
            _ => None,
        }
    }

    /// A fresh policy of `exit_type`: 10% profit target, 5% stop loss or
    /// trailing stop, 7 days hold, RSI above 70
    pub fn default_for(exit_type: ExitType) -> ExitCondition {
        match exit_type {
            ExitType::Manual => ExitCondition::Manual,
            ExitType::ProfitTarget => ExitCondition::ProfitTarget { value: 10.0 },
            ExitType::StopLoss => ExitCondition::StopLoss { value: 5.0 },
            ExitType::TrailingStop => ExitCondition::TrailingStop { value: 5.0 },
            ExitType::TimeBased => ExitCondition::TimeBased {
                time_period: 7,
                time_unit: TimeUnit::Days,
            },
            ExitType::IndicatorBased => ExitCondition::IndicatorBased {
                indicator: Indicator::Rsi,
                operator: Operator::GreaterThan,
                indicator_value: "70".to_string(),
            },
        }
    }

    /// Switch to another exit type, keeping whatever still applies.
    ///
    /// A percentage survives a switch between percentage-based types; every
    /// other newly required field starts from its default.
    pub fn with_type(&self, exit_type: ExitType) -> ExitCondition {
        if self.kind() == exit_type {
            return self.clone();
        }
        let mut next = ExitCondition::default_for(exit_type);
        if let (Some(percent), Some(slot)) = (self.percent(), next.percent_mut()) {
            *slot = percent;
        }
        next
    }

    fn percent_mut(&mut self) -> Option<&mut f64> {
        match self {
            ExitCondition::ProfitTarget { value }
            | ExitCondition::StopLoss { value }
            | ExitCondition::TrailingStop { value } => Some(value),
            _ => None,
        }
    }

    /// Preset this policy is structurally equal to, if any
    pub fn matching_preset(&self) -> Option<ExitPreset> {
        ExitPreset::ALL
            .into_iter()
            .find(|preset| preset.exit_condition() == *self)
    }

    /// Check the fields required by the active type
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ExitCondition::Manual => Ok(()),
            ExitCondition::ProfitTarget { value }
            | ExitCondition::StopLoss { value }
            | ExitCondition::TrailingStop { value } => {
                if *value > 0.0 && *value <= MAX_EXIT_PERCENT {
                    Ok(())
                } else {
                    Err(ValidationError::ExitValueOutOfRange {
                        exit_type: self.kind(),
                        value: *value,
                        max: MAX_EXIT_PERCENT,
                    })
                }
            }
            ExitCondition::TimeBased {
                time_period,
                time_unit,
            } => {
                let max = time_unit.max_period();
                if (1..=max).contains(time_period) {
                    Ok(())
                } else {
                    Err(ValidationError::TimePeriodOutOfRange {
                        unit: *time_unit,
                        value: *time_period,
                        max,
                    })
                }
            }
            ExitCondition::IndicatorBased {
                operator,
                indicator_value,
                ..
            } => {
                if !matches!(
                    operator,
                    Operator::LessThan | Operator::GreaterThan | Operator::Equals
                ) {
                    return Err(ValidationError::UnsupportedExitOperator(*operator));
                }
                indicator_value
                    .trim()
                    .parse::<f64>()
                    .map(|_| ())
                    .map_err(|_| ValidationError::NonNumericExitValue(indicator_value.clone()))
            }
        }
    }
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCondition::Manual => write!(f, "manual"),
            ExitCondition::ProfitTarget { value } => write!(f, "{}% profit target", value),
            ExitCondition::StopLoss { value } => write!(f, "{}% stop loss", value),
            ExitCondition::TrailingStop { value } => write!(f, "{}% trailing stop", value),
            ExitCondition::TimeBased {
                time_period,
                time_unit,
            } => write!(f, "hold {} {}", time_period, time_unit),
            ExitCondition::IndicatorBased {
                indicator,
                operator,
                indicator_value,
            } => write!(
                f,
                "{} {} {}",
                indicator.label(),
                operator.symbol(),
                indicator_value
            ),
        }
    }
}

/// Flat stored form of an exit policy, every field optional
#[derive(Debug, Deserialize)]
struct ExitDocument {
    #[serde(rename = "type", default, deserialize_with = "lenient::choice")]
    kind: Option<ExitType>,
    #[serde(default, deserialize_with = "lenient::number")]
    value: Option<f64>,
    #[serde(rename = "timePeriod", default, deserialize_with = "lenient::count")]
    time_period: Option<u32>,
    #[serde(rename = "timeUnit", default, deserialize_with = "lenient::choice")]
    time_unit: Option<TimeUnit>,
    #[serde(default, deserialize_with = "lenient::choice")]
    indicator: Option<Indicator>,
    #[serde(default, deserialize_with = "lenient::choice")]
    operator: Option<Operator>,
    #[serde(rename = "indicatorValue", default, deserialize_with = "lenient::opt_text")]
    indicator_value: Option<String>,
}

impl From<ExitDocument> for ExitCondition {
    fn from(doc: ExitDocument) -> Self {
        let mut exit = ExitCondition::default_for(doc.kind.unwrap_or(ExitType::Manual));
        match &mut exit {
            ExitCondition::Manual => {}
            ExitCondition::ProfitTarget { value }
            | ExitCondition::StopLoss { value }
            | ExitCondition::TrailingStop { value } => {
                if let Some(stored) = doc.value {
                    *value = stored;
                }
            }
            ExitCondition::TimeBased {
                time_period,
                time_unit,
            } => {
                if let Some(stored) = doc.time_period {
                    *time_period = stored;
                }
                if let Some(stored) = doc.time_unit {
                    *time_unit = stored;
                }
            }
            ExitCondition::IndicatorBased {
                indicator,
                operator,
                indicator_value,
            } => {
                if let Some(stored) = doc.indicator {
                    *indicator = stored;
                }
                if let Some(stored) = doc.operator {
                    *operator = stored;
                }
                if let Some(stored) = doc.indicator_value {
                    *indicator_value = stored;
                }
            }
        }
        exit
    }
}

/// One-click exit policies offered next to the custom editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPreset {
    Manual,
    TrailingStop5,
    ProfitTarget10,
    Hold7Days,
}

impl ExitPreset {
    pub const ALL: [ExitPreset; 4] = [
        ExitPreset::Manual,
        ExitPreset::TrailingStop5,
        ExitPreset::ProfitTarget10,
        ExitPreset::Hold7Days,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExitPreset::Manual => "Manual Exit",
            ExitPreset::TrailingStop5 => "5% Trailing Stop",
            ExitPreset::ProfitTarget10 => "10% Profit Target",
            ExitPreset::Hold7Days => "7 Days Hold",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExitPreset::Manual => "Exit when conditions reverse",
            ExitPreset::TrailingStop5 => "Dynamic trailing stop to protect profits",
            ExitPreset::ProfitTarget10 => "Exit at 10% profit",
            ExitPreset::Hold7Days => "Hold position for 7 days",
        }
    }

    pub fn exit_condition(&self) -> ExitCondition {
        match self {
            ExitPreset::Manual => ExitCondition::Manual,
            ExitPreset::TrailingStop5 => ExitCondition::TrailingStop { value: 5.0 },
            ExitPreset::ProfitTarget10 => ExitCondition::ProfitTarget { value: 10.0 },
            ExitPreset::Hold7Days => ExitCondition::TimeBased {
                time_period: 7,
                time_unit: TimeUnit::Days,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manual_wire_shape() {
        assert_eq!(serde_json::to_value(ExitCondition::Manual).unwrap(), json!({"type": "manual"}));
    }

    #[test]
    fn test_time_based_wire_shape() {
        let exit = ExitCondition::TimeBased {
            time_period: 12,
            time_unit: TimeUnit::Hours,
        };
        assert_eq!(
            serde_json::to_value(&exit).unwrap(),
            json!({"type": "time_based", "timePeriod": 12, "timeUnit": "hours"})
        );
    }

    #[test]
    fn test_inert_fields_are_ignored_on_decode() {
        let exit: ExitCondition = serde_json::from_value(json!({
            "type": "profit_target",
            "value": 12.5,
            "timePeriod": 99999,
            "timeUnit": "days",
            "indicatorValue": "abc"
        }))
        .unwrap();
        assert_eq!(exit, ExitCondition::ProfitTarget { value: 12.5 });
        assert!(exit.validate().is_ok());
    }

    #[test]
    fn test_manual_with_leftover_fields_decodes() {
        let exit: ExitCondition =
            serde_json::from_value(json!({"type": "manual", "value": 5})).unwrap();
        assert_eq!(exit, ExitCondition::Manual);
    }

    #[test]
    fn test_time_unit_defaults_to_days() {
        let exit: ExitCondition =
            serde_json::from_value(json!({"type": "time_based", "timePeriod": 3})).unwrap();
        assert_eq!(
            exit,
            ExitCondition::TimeBased {
                time_period: 3,
                time_unit: TimeUnit::Days
            }
        );
    }

    #[test]
    fn test_percent_bounds() {
        assert!(ExitCondition::TrailingStop { value: 50.0 }.validate().is_ok());
        assert!(ExitCondition::TrailingStop { value: 50.1 }.validate().is_err());
        assert!(ExitCondition::ProfitTarget { value: 0.0 }.validate().is_err());
        assert!(ExitCondition::StopLoss { value: f64::NAN }.validate().is_err());
    }

    #[test]
    fn test_time_bounds_per_unit() {
        let hold = |time_period, time_unit| ExitCondition::TimeBased {
            time_period,
            time_unit,
        };
        assert!(hold(1440, TimeUnit::Minutes).validate().is_ok());
        assert!(hold(1441, TimeUnit::Minutes).validate().is_err());
        assert!(hold(8760, TimeUnit::Hours).validate().is_ok());
        assert!(hold(8761, TimeUnit::Hours).validate().is_err());
        assert!(hold(365, TimeUnit::Days).validate().is_ok());
        assert!(hold(366, TimeUnit::Days).validate().is_err());
        assert!(hold(0, TimeUnit::Days).validate().is_err());
    }

    #[test]
    fn test_indicator_based_rules() {
        let exit = ExitCondition::IndicatorBased {
            indicator: Indicator::Rsi,
            operator: Operator::CrossesAbove,
            indicator_value: "70".to_string(),
        };
        assert_eq!(
            exit.validate(),
            Err(ValidationError::UnsupportedExitOperator(Operator::CrossesAbove))
        );

        let exit = ExitCondition::IndicatorBased {
            indicator: Indicator::Rsi,
            operator: Operator::GreaterThan,
            indicator_value: "seventy".to_string(),
        };
        assert!(matches!(exit.validate(), Err(ValidationError::NonNumericExitValue(_))));
    }

    #[test]
    fn test_presets_match_structurally() {
        for preset in ExitPreset::ALL {
            assert_eq!(preset.exit_condition().matching_preset(), Some(preset));
            assert!(preset.exit_condition().validate().is_ok());
        }
        let typed_by_hand = ExitCondition::TrailingStop { value: 5.0 };
        assert_eq!(typed_by_hand.matching_preset(), Some(ExitPreset::TrailingStop5));
        assert_eq!(ExitCondition::TrailingStop { value: 6.0 }.matching_preset(), None);
        let hours = ExitCondition::TimeBased {
            time_period: 7,
            time_unit: TimeUnit::Hours,
        };
        assert_eq!(hours.matching_preset(), None);
    }

    #[test]
    fn test_with_type_keeps_percent() {
        let trailing = ExitCondition::TrailingStop { value: 8.0 };
        assert_eq!(
            trailing.with_type(ExitType::ProfitTarget),
            ExitCondition::ProfitTarget { value: 8.0 }
        );
        assert_eq!(
            ExitCondition::Manual.with_type(ExitType::ProfitTarget),
            ExitCondition::ProfitTarget { value: 10.0 }
        );
        assert_eq!(trailing.with_type(ExitType::Manual), ExitCondition::Manual);
        assert_eq!(trailing.with_type(ExitType::TrailingStop), trailing);
    }

    #[test]
    fn test_partial_percent_policies_take_defaults() {
        let read = |doc| serde_json::from_value::<ExitCondition>(doc).unwrap();
        assert_eq!(read(json!({"type": "profit_target"})), ExitCondition::ProfitTarget { value: 10.0 });
        assert_eq!(read(json!({"type": "stop_loss", "value": ""})), ExitCondition::StopLoss { value: 5.0 });
        assert_eq!(
            read(json!({"type": "trailing_stop", "value": null})),
            ExitCondition::TrailingStop { value: 5.0 }
        );
        assert_eq!(read(json!({"type": "stop_loss", "value": "3.5"})), ExitCondition::StopLoss { value: 3.5 });
    }

    #[test]
    fn test_partial_time_policies_take_defaults() {
        let read = |doc| serde_json::from_value::<ExitCondition>(doc).unwrap();
        assert_eq!(read(json!({"type": "time_based", "timeUnit": "hours"})), ExitCondition::TimeBased {
            time_period: 7,
            time_unit: TimeUnit::Hours
        });
        assert_eq!(
            read(json!({"type": "time_based", "timePeriod": null, "timeUnit": null})),
            ExitPreset::Hold7Days.exit_condition()
        );
    }

    #[test]
    fn test_partial_indicator_policy_takes_defaults() {
        let exit: ExitCondition = serde_json::from_value(json!({"type": "indicator_based"})).unwrap();
        assert_eq!(exit, ExitCondition::default_for(ExitType::IndicatorBased));

        let exit: ExitCondition = serde_json::from_value(json!({
            "type": "indicator_based",
            "indicator": "Williams_R",
            "indicatorValue": -80
        }))
        .unwrap();
        assert_eq!(
            exit,
            ExitCondition::IndicatorBased {
                indicator: Indicator::WilliamsR,
                operator: Operator::GreaterThan,
                indicator_value: "-80".to_string()
            }
        );
    }

    #[test]
    fn test_decoded_values_are_not_range_checked() {
        let exit: ExitCondition =
            serde_json::from_value(json!({"type": "stop_loss", "value": 80})).unwrap();
        assert_eq!(exit, ExitCondition::StopLoss { value: 80.0 });
        assert!(exit.validate().is_err());
    }

    #[test]
    fn test_missing_or_unknown_type_is_manual() {
        let read = |doc| serde_json::from_value::<ExitCondition>(doc).unwrap();
        assert_eq!(read(json!({})), ExitCondition::Manual);
        assert_eq!(read(json!({"type": "moon_phase", "value": 5})), ExitCondition::Manual);
    }
}
