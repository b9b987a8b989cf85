//! No-code trading strategy builder
//!
//! Strategies are composed from market conditions (indicator, operator,
//! values), one logical combinator, a trade direction and an exit policy.
//! [`StrategyBuilder`] edits a draft incrementally and saves, loads and
//! deletes strategies through a [`StrategyStore`].

pub mod builder;
pub mod condition;
pub mod config;
pub mod error;
pub mod exit;
pub mod indicators;
mod lenient;
pub mod store;
pub mod strategy;
pub mod types;

pub use builder::{DeleteReport, SaveReport, SharedBuilder, StrategyBuilder};
pub use condition::{Condition, ConditionEdit, CrossPreset, COMMON_CROSSES};
pub use config::Config;
pub use error::{BuilderError, ValidationError};
pub use exit::{ExitCondition, ExitPreset, ExitType};
pub use indicators::{IndicatorSpec, ParamSide};
pub use store::{StoreError, StrategyStore};
pub use strategy::{SavedStrategy, StrategyConfiguration, StrategySummary};
pub use types::*;
