//! Condition model
//!
//! A [`Condition`] is one market rule of a strategy: an indicator, an
//! operator and the value(s) it is compared against. Cross operators compare
//! against a second indicator series instead of a constant.
//!
//! In memory each side carries an [`IndicatorSpec`] with exactly its own
//! parameters. Stored documents use a flat field bag (`period`,
//! `fast_period`, ..., `comparePeriod`, ...); conversion happens only at the
//! serde boundary, where fields that do not belong to the selected indicator
//! are dropped.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::indicators::{IndicatorSpec, ParamSide};
use crate::lenient;
use crate::types::{ConditionId, Indicator, Operator, OperatorShape};

/// One market rule of a strategy
///
/// The operator and the compare fields are private: they only change
/// through [`Condition::apply`], which keeps them consistent with the
/// operator's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionDocument", into = "ConditionDocument")]
pub struct Condition {
    pub id: ConditionId,
    pub indicator: IndicatorSpec,
    operator: Operator,
    /// Raw user input; the lower bound for range operators, display-only for
    /// cross operators
    pub value: String,
    /// Right-hand series of a cross; `None` compares against price
    compare_indicator: Option<IndicatorSpec>,
    /// Upper bound for range operators, optional label for cross operators
    compare_value: Option<String>,
}

impl Condition {
    pub fn new(indicator: Indicator, operator: Operator, value: impl Into<String>) -> Self {
        Condition {
            id: ConditionId::generate(),
            indicator: IndicatorSpec::with_defaults(indicator),
            operator,
            value: value.into(),
            compare_indicator: None,
            compare_value: None,
        }
    }

    /// RSI(14) below 30, the rule a fresh draft starts with
    pub fn initial() -> Self {
        Condition::new(Indicator::Rsi, Operator::LessThan, "30")
    }

    /// MACD(12,26,9) crossing above its signal line, the rule appended by
    /// "add condition"
    pub fn new_default() -> Self {
        Condition::new(Indicator::Macd, Operator::CrossesAbove, "Signal Line")
    }

    /// Cross of `primary` over `compare`, both with default parameters
    pub fn cross(primary: Indicator, compare: Indicator, value: impl Into<String>) -> Self {
        Condition {
            compare_indicator: Some(IndicatorSpec::with_defaults(compare)),
            ..Condition::new(primary, Operator::CrossesAbove, value)
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Series picked for the right-hand side of a cross
    pub fn compare_indicator(&self) -> Option<&IndicatorSpec> {
        self.compare_indicator.as_ref()
    }

    pub fn compare_value(&self) -> Option<&str> {
        self.compare_value.as_deref()
    }

    /// Right-hand series of a cross, price when none was picked
    pub fn compare_spec(&self) -> IndicatorSpec {
        self.compare_indicator.unwrap_or(IndicatorSpec::Close)
    }

    /// Replace one aspect of the condition.
    ///
    /// Nothing is changed when the edit is rejected.
    pub fn apply(&mut self, edit: ConditionEdit) -> Result<(), ValidationError> {
        match edit {
            ConditionEdit::Indicator(indicator) => {
                self.indicator = IndicatorSpec::with_defaults(indicator);
            }
            ConditionEdit::Operator(operator) => {
                self.operator = operator;
                if !operator.is_cross() {
                    self.compare_indicator = None;
                }
                if operator.shape() == OperatorShape::Scalar {
                    self.compare_value = None;
                }
            }
            ConditionEdit::Value(value) => self.value = value,
            ConditionEdit::CompareIndicator(indicator) => {
                if !self.operator.is_cross() {
                    return Err(ValidationError::CompareIndicatorRequiresCross(self.operator));
                }
                self.compare_indicator = Some(IndicatorSpec::with_defaults(indicator));
            }
            ConditionEdit::CompareValue(value) => {
                if self.operator.shape() == OperatorShape::Scalar {
                    return Err(ValidationError::CompareValueNotApplicable(self.operator));
                }
                self.compare_value = value;
            }
            ConditionEdit::Parameter { side, name, value } => match side {
                ParamSide::Primary => self.indicator.set_param(&name, value)?,
                ParamSide::Compare => {
                    if !self.operator.is_cross() {
                        return Err(ValidationError::CompareIndicatorRequiresCross(self.operator));
                    }
                    let mut spec = self.compare_spec();
                    spec.set_param(&name, value)?;
                    self.compare_indicator = Some(spec);
                }
            },
        }
        Ok(())
    }

    /// Human readable form, e.g. `RSI(14) < 30` or `SMA(20) crosses above EMA(20)`
    pub fn describe(&self) -> String {
        match self.operator.shape() {
            OperatorShape::Scalar => {
                format!("{} {} {}", self.indicator, self.operator.symbol(), self.value)
            }
            OperatorShape::Range => format!(
                "{} {} {} and {}",
                self.indicator,
                self.operator.symbol(),
                self.value,
                self.compare_value.as_deref().unwrap_or("?")
            ),
            OperatorShape::Cross => format!(
                "{} {} {}",
                self.indicator,
                self.operator.symbol(),
                self.compare_spec()
            ),
        }
    }
}

/// A single change to a condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEdit {
    /// Switch indicator; its parameters restart from their defaults while
    /// operator and value are kept
    Indicator(Indicator),
    /// Switch operator; compare fields that no longer apply are cleared
    Operator(Operator),
    Value(String),
    /// Only valid while the operator is a cross
    CompareIndicator(Indicator),
    /// Upper bound of a range, or the optional label of a cross
    CompareValue(Option<String>),
    Parameter {
        side: ParamSide,
        name: String,
        value: u32,
    },
}

/// Ready-made cross rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossPreset {
    pub label: &'static str,
    pub primary: Indicator,
    pub compare: Indicator,
    pub value: &'static str,
}

pub const COMMON_CROSSES: [CrossPreset; 9] = [
    CrossPreset { label: "SMA crosses EMA", primary: Indicator::Sma, compare: Indicator::Ema, value: "" },
    CrossPreset { label: "EMA crosses SMA", primary: Indicator::Ema, compare: Indicator::Sma, value: "" },
    CrossPreset { label: "Price crosses SMA", primary: Indicator::Close, compare: Indicator::Sma, value: "" },
    CrossPreset { label: "Price crosses EMA", primary: Indicator::Close, compare: Indicator::Ema, value: "" },
    CrossPreset { label: "RSI crosses 30", primary: Indicator::Rsi, compare: Indicator::Close, value: "30" },
    CrossPreset { label: "RSI crosses 70", primary: Indicator::Rsi, compare: Indicator::Close, value: "70" },
    CrossPreset { label: "MACD crosses Signal", primary: Indicator::Macd, compare: Indicator::Macd, value: "Signal Line" },
    CrossPreset { label: "Stochastic crosses 20", primary: Indicator::Stochastic, compare: Indicator::Close, value: "20" },
    CrossPreset { label: "Stochastic crosses 80", primary: Indicator::Stochastic, compare: Indicator::Close, value: "80" },
];

impl CrossPreset {
    pub fn condition(&self) -> Condition {
        Condition::cross(self.primary, self.compare, self.value)
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// Flat stored form of a condition
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConditionDocument {
    #[serde(default = "ConditionId::generate")]
    id: ConditionId,
    indicator: Indicator,
    operator: Operator,
    #[serde(default, deserialize_with = "lenient::text")]
    value: String,
    #[serde(rename = "compareIndicator", default, skip_serializing_if = "Option::is_none")]
    compare_indicator: Option<Indicator>,
    #[serde(
        rename = "compareValue",
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    compare_value: Option<String>,

    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    period: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    fast_period: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    slow_period: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    signal_period: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    upper_band: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    lower_band: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    k_period: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    d_period: Option<u32>,

    #[serde(rename = "comparePeriod", default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    compare_period: Option<u32>,
    #[serde(
        rename = "compareFastPeriod",
        alias = "compareFast_period",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_fast_period: Option<u32>,
    #[serde(
        rename = "compareSlowPeriod",
        alias = "compareSlow_period",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_slow_period: Option<u32>,
    #[serde(
        rename = "compareSignalPeriod",
        alias = "compareSignal_period",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_signal_period: Option<u32>,
    #[serde(
        rename = "compareUpperBand",
        alias = "compareUpper_band",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_upper_band: Option<u32>,
    #[serde(
        rename = "compareLowerBand",
        alias = "compareLower_band",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_lower_band: Option<u32>,
    #[serde(
        rename = "compareKPeriod",
        alias = "compareK_period",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_k_period: Option<u32>,
    #[serde(
        rename = "compareDPeriod",
        alias = "compareD_period",
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    compare_d_period: Option<u32>,
}

impl ConditionDocument {
    fn empty(id: ConditionId, indicator: Indicator, operator: Operator, value: String) -> Self {
        ConditionDocument {
            id,
            indicator,
            operator,
            value,
            compare_indicator: None,
            compare_value: None,
            period: None,
            fast_period: None,
            slow_period: None,
            signal_period: None,
            upper_band: None,
            lower_band: None,
            k_period: None,
            d_period: None,
            compare_period: None,
            compare_fast_period: None,
            compare_slow_period: None,
            compare_signal_period: None,
            compare_upper_band: None,
            compare_lower_band: None,
            compare_k_period: None,
            compare_d_period: None,
        }
    }

    fn param(&self, side: ParamSide, name: &str) -> Option<u32> {
        match (side, name) {
            (ParamSide::Primary, "period") => self.period,
            (ParamSide::Primary, "fast_period") => self.fast_period,
            (ParamSide::Primary, "slow_period") => self.slow_period,
            (ParamSide::Primary, "signal_period") => self.signal_period,
            (ParamSide::Primary, "upper_band") => self.upper_band,
            (ParamSide::Primary, "lower_band") => self.lower_band,
            (ParamSide::Primary, "k_period") => self.k_period,
            (ParamSide::Primary, "d_period") => self.d_period,
            (ParamSide::Compare, "period") => self.compare_period,
            (ParamSide::Compare, "fast_period") => self.compare_fast_period,
            (ParamSide::Compare, "slow_period") => self.compare_slow_period,
            (ParamSide::Compare, "signal_period") => self.compare_signal_period,
            (ParamSide::Compare, "upper_band") => self.compare_upper_band,
            (ParamSide::Compare, "lower_band") => self.compare_lower_band,
            (ParamSide::Compare, "k_period") => self.compare_k_period,
            (ParamSide::Compare, "d_period") => self.compare_d_period,
            _ => None,
        }
    }

    fn param_mut(&mut self, side: ParamSide, name: &str) -> Option<&mut Option<u32>> {
        let slot = match (side, name) {
            (ParamSide::Primary, "period") => &mut self.period,
            (ParamSide::Primary, "fast_period") => &mut self.fast_period,
            (ParamSide::Primary, "slow_period") => &mut self.slow_period,
            (ParamSide::Primary, "signal_period") => &mut self.signal_period,
            (ParamSide::Primary, "upper_band") => &mut self.upper_band,
            (ParamSide::Primary, "lower_band") => &mut self.lower_band,
            (ParamSide::Primary, "k_period") => &mut self.k_period,
            (ParamSide::Primary, "d_period") => &mut self.d_period,
            (ParamSide::Compare, "period") => &mut self.compare_period,
            (ParamSide::Compare, "fast_period") => &mut self.compare_fast_period,
            (ParamSide::Compare, "slow_period") => &mut self.compare_slow_period,
            (ParamSide::Compare, "signal_period") => &mut self.compare_signal_period,
            (ParamSide::Compare, "upper_band") => &mut self.compare_upper_band,
            (ParamSide::Compare, "lower_band") => &mut self.compare_lower_band,
            (ParamSide::Compare, "k_period") => &mut self.compare_k_period,
            (ParamSide::Compare, "d_period") => &mut self.compare_d_period,
            _ => return None,
        };
        Some(slot)
    }

    fn write_params(&mut self, side: ParamSide, spec: &IndicatorSpec) {
        for (name, value) in spec.params() {
            if let Some(slot) = self.param_mut(side, name) {
                *slot = Some(value);
            }
        }
    }
}

impl From<ConditionDocument> for Condition {
    fn from(doc: ConditionDocument) -> Self {
        let indicator =
            IndicatorSpec::from_lookup(doc.indicator, |name| doc.param(ParamSide::Primary, name));
        let compare_indicator = if doc.operator.is_cross() {
            doc.compare_indicator.map(|compare| {
                IndicatorSpec::from_lookup(compare, |name| doc.param(ParamSide::Compare, name))
            })
        } else {
            None
        };
        let compare_value = match doc.operator.shape() {
            OperatorShape::Scalar => None,
            OperatorShape::Range | OperatorShape::Cross => doc.compare_value,
        };
        Condition {
            id: doc.id,
            indicator,
            operator: doc.operator,
            value: doc.value,
            compare_indicator,
            compare_value,
        }
    }
}

impl From<Condition> for ConditionDocument {
    fn from(condition: Condition) -> Self {
        let mut doc = ConditionDocument::empty(
            condition.id,
            condition.indicator.indicator(),
            condition.operator,
            condition.value,
        );
        doc.write_params(ParamSide::Primary, &condition.indicator);
        if condition.operator.is_cross() {
            if let Some(compare) = condition.compare_indicator {
                doc.compare_indicator = Some(compare.indicator());
                doc.write_params(ParamSide::Compare, &compare);
            }
        }
        if condition.operator.shape() != OperatorShape::Scalar {
            doc.compare_value = condition.compare_value;
        }
        doc
    }
}
