//! Strategy configuration and saved strategy records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::condition::Condition;
use crate::error::ValidationError;
use crate::exit::ExitCondition;
use crate::types::{Action, LogicalOperator, OperatorShape, StrategyId};

/// Complete rule set of a strategy, persisted and handed to the backtest
/// engine as-is
///
/// Every field defaults when absent or null so that older documents still
/// load: no conditions, AND, LONG, manual exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfiguration {
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: Vec<Condition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logical_operator: LogicalOperator,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: Action,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exit_condition: ExitCondition,
}

impl StrategyConfiguration {
    /// Starting draft: RSI(14) below 30, AND, LONG, manual exit
    pub fn canonical_default() -> Self {
        StrategyConfiguration {
            conditions: vec![Condition::initial()],
            logical_operator: LogicalOperator::And,
            action: Action::Long,
            exit_condition: ExitCondition::Manual,
        }
    }

    /// Full check run before the configuration is handed to a backtest.
    ///
    /// Stricter than what saving requires: partially typed values are fine
    /// in a saved draft but not here. Condition positions in errors are
    /// 1-based.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.conditions.is_empty() {
            return Err(ValidationError::NoConditions);
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            check_condition(i + 1, condition)?;
        }
        self.exit_condition.validate()
    }
}

impl Default for StrategyConfiguration {
    fn default() -> Self {
        StrategyConfiguration::canonical_default()
    }
}

impl fmt::Display for StrategyConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.conditions.iter().map(Condition::describe).collect();
        let joiner = format!(" {} ", self.logical_operator);
        let rules = if rules.is_empty() {
            "(no conditions)".to_string()
        } else {
            rules.join(&joiner)
        };
        write!(f, "IF {} THEN {}, EXIT {}", rules, self.action, self.exit_condition)
    }
}

fn check_condition(index: usize, condition: &Condition) -> Result<(), ValidationError> {
    condition.indicator.validate()?;
    if let Some(compare) = condition.compare_indicator() {
        compare.validate()?;
    }

    let number = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::NonNumericValue {
                index,
                value: raw.to_string(),
            })
    };

    match condition.operator().shape() {
        OperatorShape::Scalar => {
            number(&condition.value)?;
        }
        OperatorShape::Range => {
            let upper = condition
                .compare_value()
                .filter(|v| !v.trim().is_empty());
            let (lower, upper) = match (condition.value.trim().is_empty(), upper) {
                (false, Some(upper)) => (condition.value.as_str(), upper),
                _ => return Err(ValidationError::MissingRangeBound { index }),
            };
            let (min, max) = (number(lower)?, number(upper)?);
            if min > max {
                return Err(ValidationError::InvertedRange { index, min, max });
            }
        }
        OperatorShape::Cross => {}
    }
    Ok(())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A strategy as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStrategy {
    pub id: StrategyId,
    pub name: String,
    pub configuration: StrategyConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SavedStrategy {
    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// List entry for a saved strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub id: StrategyId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionEdit;
    use crate::types::{ConditionId, Indicator, Operator, TimeUnit};
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_canonical_default() {
        let config = StrategyConfiguration::canonical_default();
        assert_eq!(config.conditions.len(), 1);
        assert_eq!(config.conditions[0].describe(), "RSI(14) < 30");
        assert_eq!(config.logical_operator, LogicalOperator::And);
        assert_eq!(config.action, Action::Long);
        assert_eq!(config.exit_condition, ExitCondition::Manual);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions[0].id = ConditionId::new("c1");
        config.action = Action::Short;
        config.exit_condition = ExitCondition::TimeBased {
            time_period: 7,
            time_unit: TimeUnit::Days,
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "conditions": [
                    {"id": "c1", "indicator": "RSI", "operator": "less_than", "value": "30", "period": 14}
                ],
                "logicalOperator": "AND",
                "action": "SHORT",
                "exitCondition": {"type": "time_based", "timePeriod": 7, "timeUnit": "days"}
            })
        );
    }

    #[test]
    fn test_legacy_document_defaults() {
        let config: StrategyConfiguration = serde_json::from_value(json!({})).unwrap();
        assert!(config.conditions.is_empty());
        assert_eq!(config.logical_operator, LogicalOperator::And);
        assert_eq!(config.action, Action::Long);
        assert_eq!(config.exit_condition, ExitCondition::Manual);

        let config: StrategyConfiguration = serde_json::from_value(json!({
            "conditions": null,
            "logicalOperator": "OR",
            "action": null,
            "exitCondition": null
        }))
        .unwrap();
        assert!(config.conditions.is_empty());
        assert_eq!(config.logical_operator, LogicalOperator::Or);
        assert_eq!(config.action, Action::Long);
    }

    #[test]
    fn test_validate_requires_conditions() {
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions.clear();
        assert_eq!(config.validate(), Err(ValidationError::NoConditions));
    }

    #[test]
    fn test_validate_scalar_value() {
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions[0].value = "3".to_string();
        assert!(config.validate().is_ok());
        config.conditions[0].value = "3.".to_string();
        assert!(config.validate().is_ok());
        config.conditions[0].value = "-".to_string();
        assert_eq!(
            config.validate(),
            Err(ValidationError::NonNumericValue {
                index: 1,
                value: "-".to_string()
            })
        );
    }

    #[test]
    fn test_validate_range() {
        let mut config = StrategyConfiguration::canonical_default();
        let condition = &mut config.conditions[0];
        condition.apply(ConditionEdit::Operator(Operator::Between)).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::MissingRangeBound { index: 1 }));

        config.conditions[0]
            .apply(ConditionEdit::CompareValue(Some("20".to_string())))
            .unwrap();
        match config.validate() {
            Err(ValidationError::InvertedRange { index, min, max }) => {
                assert_eq!(index, 1);
                assert_relative_eq!(min, 30.0);
                assert_relative_eq!(max, 20.0);
            }
            other => panic!("expected inverted range, got {:?}", other),
        }

        config.conditions[0]
            .apply(ConditionEdit::CompareValue(Some("70".to_string())))
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_cross_ignores_value() {
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions.push(Condition::new_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_stored_out_of_range_params() {
        let config: StrategyConfiguration = serde_json::from_value(json!({
            "conditions": [{"id": "a", "indicator": "SMA", "operator": "greater_than", "value": "1", "period": 500}]
        }))
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ParameterOutOfRange { value: 500, .. })
        ));
    }

    #[test]
    fn test_validate_checks_exit() {
        let mut config = StrategyConfiguration::canonical_default();
        config.exit_condition = ExitCondition::StopLoss { value: 75.0 };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ExitValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_display() {
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions.push(Condition::new(Indicator::Volume, Operator::GreaterThan, "1000"));
        config.logical_operator = LogicalOperator::Or;
        assert_eq!(
            config.to_string(),
            "IF RSI(14) < 30 OR Volume > 1000 THEN LONG, EXIT manual"
        );
    }

    #[test]
    fn test_saved_strategy_timestamps_are_optional() {
        let saved: SavedStrategy = serde_json::from_value(json!({
            "id": 4,
            "name": "Breakout",
            "configuration": {"conditions": []}
        }))
        .unwrap();
        assert_eq!(saved.id, StrategyId(4));
        assert!(saved.created_at.is_none());
        assert_eq!(saved.summary().name, "Breakout");

        let saved: SavedStrategy = serde_json::from_value(json!({
            "id": 5,
            "name": "Dated",
            "configuration": {},
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-02T10:00:00.123456Z"
        }))
        .unwrap();
        assert!(saved.created_at.is_some());
        assert!(saved.updated_at.is_some());
    }
}
