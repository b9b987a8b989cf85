//! Core vocabulary shared by the condition, exit and strategy models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Technical indicator a condition can be built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "Bollinger_Bands")]
    BollingerBands,
    #[serde(rename = "Stochastic")]
    Stochastic,
    #[serde(rename = "Williams_R")]
    WilliamsR,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "Volume")]
    Volume,
    #[serde(rename = "Close")]
    Close,
}

impl Indicator {
    pub const ALL: [Indicator; 10] = [
        Indicator::Rsi,
        Indicator::Macd,
        Indicator::Sma,
        Indicator::Ema,
        Indicator::BollingerBands,
        Indicator::Stochastic,
        Indicator::WilliamsR,
        Indicator::Atr,
        Indicator::Volume,
        Indicator::Close,
    ];

    /// Wire identifier, as stored in strategy documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Rsi => "RSI",
            Indicator::Macd => "MACD",
            Indicator::Sma => "SMA",
            Indicator::Ema => "EMA",
            Indicator::BollingerBands => "Bollinger_Bands",
            Indicator::Stochastic => "Stochastic",
            Indicator::WilliamsR => "Williams_R",
            Indicator::Atr => "ATR",
            Indicator::Volume => "Volume",
            Indicator::Close => "Close",
        }
    }

    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            Indicator::BollingerBands => "Bollinger Bands",
            Indicator::WilliamsR => "Williams %R",
            Indicator::Close => "Price",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indicator::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown indicator: {}", s))
    }
}

/// How many comparison operands an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorShape {
    /// One constant value
    Scalar,
    /// `value` is the lower bound, `compareValue` the upper bound
    Range,
    /// Series against series; `value` is for display only
    Cross,
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    LessThan,
    GreaterThan,
    Equals,
    NotEquals,
    CrossesAbove,
    CrossesBelow,
    Between,
    Outside,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::LessThan,
        Operator::GreaterThan,
        Operator::Equals,
        Operator::NotEquals,
        Operator::CrossesAbove,
        Operator::CrossesBelow,
        Operator::Between,
        Operator::Outside,
    ];

    pub fn shape(&self) -> OperatorShape {
        match self {
            Operator::LessThan | Operator::GreaterThan | Operator::Equals | Operator::NotEquals => {
                OperatorShape::Scalar
            }
            Operator::Between | Operator::Outside => OperatorShape::Range,
            Operator::CrossesAbove | Operator::CrossesBelow => OperatorShape::Cross,
        }
    }

    pub fn is_cross(&self) -> bool {
        self.shape() == OperatorShape::Cross
    }

    pub fn is_range(&self) -> bool {
        self.shape() == OperatorShape::Range
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::LessThan => "less_than",
            Operator::GreaterThan => "greater_than",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::CrossesAbove => "crosses_above",
            Operator::CrossesBelow => "crosses_below",
            Operator::Between => "between",
            Operator::Outside => "outside",
        }
    }

    /// Short notation used when rendering a rule
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::CrossesAbove => "crosses above",
            Operator::CrossesBelow => "crosses below",
            Operator::Between => "between",
            Operator::Outside => "outside",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operator: {}", s))
    }
}

/// Combinator applied uniformly across every condition of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
        }
    }
}

/// Direction of the position opened when the conditions trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[default]
    Long,
    Short,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Long => write!(f, "LONG"),
            Action::Short => write!(f, "SHORT"),
        }
    }
}

/// Unit of a time-based hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    #[default]
    Days,
}

impl TimeUnit {
    /// Longest hold accepted for this unit
    pub fn max_period(&self) -> u32 {
        match self {
            TimeUnit::Minutes => 1440,
            TimeUnit::Hours => 8760,
            TimeUnit::Days => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned identity of a saved strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(pub i64);

impl StrategyId {
    /// Ids are assigned from 1 upwards; zero or negative means "nothing selected"
    pub fn is_set(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a condition inside a draft
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(String);

impl ConditionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConditionId(id.into())
    }

    /// Fresh random id
    pub fn generate() -> Self {
        ConditionId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConditionId {
    fn from(id: &str) -> Self {
        ConditionId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_wire_names() {
        assert_eq!(serde_json::to_string(&Indicator::BollingerBands).unwrap(), "\"Bollinger_Bands\"");
        assert_eq!(serde_json::to_string(&Indicator::WilliamsR).unwrap(), "\"Williams_R\"");
        let parsed: Indicator = serde_json::from_str("\"RSI\"").unwrap();
        assert_eq!(parsed, Indicator::Rsi);
        for indicator in Indicator::ALL {
            let json = serde_json::to_string(&indicator).unwrap();
            assert_eq!(json, format!("\"{}\"", indicator.as_str()));
        }
    }

    #[test]
    fn test_indicator_from_str_is_case_insensitive() {
        assert_eq!("macd".parse::<Indicator>().unwrap(), Indicator::Macd);
        assert_eq!("bollinger_bands".parse::<Indicator>().unwrap(), Indicator::BollingerBands);
        assert!("ADX".parse::<Indicator>().is_err());
    }

    #[test]
    fn test_operator_shapes() {
        assert_eq!(Operator::LessThan.shape(), OperatorShape::Scalar);
        assert_eq!(Operator::NotEquals.shape(), OperatorShape::Scalar);
        assert_eq!(Operator::Between.shape(), OperatorShape::Range);
        assert_eq!(Operator::Outside.shape(), OperatorShape::Range);
        assert!(Operator::CrossesAbove.is_cross());
        assert!(Operator::CrossesBelow.is_cross());
        assert_eq!(serde_json::to_string(&Operator::CrossesAbove).unwrap(), "\"crosses_above\"");
    }

    #[test]
    fn test_logical_operator_and_action_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&LogicalOperator::Or).unwrap(), "\"OR\"");
        assert_eq!(serde_json::to_string(&Action::Short).unwrap(), "\"SHORT\"");
        assert_eq!(LogicalOperator::default(), LogicalOperator::And);
        assert_eq!(Action::default(), Action::Long);
    }

    #[test]
    fn test_time_unit_bounds() {
        assert_eq!(TimeUnit::Minutes.max_period(), 1440);
        assert_eq!(TimeUnit::Hours.max_period(), 8760);
        assert_eq!(TimeUnit::Days.max_period(), 365);
    }

    #[test]
    fn test_strategy_id_unset() {
        assert!(!StrategyId(0).is_set());
        assert!(StrategyId(7).is_set());
    }

    #[test]
    fn test_generated_condition_ids_are_unique() {
        let a = ConditionId::generate();
        let b = ConditionId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }
}
