//! Strategy builder
//!
//! [`StrategyBuilder`] owns one draft [`StrategyConfiguration`] and a cached
//! list of the user's saved strategies. It is the only thing that mutates
//! either. Every mutation takes `&mut self`, including the ones that wait on
//! the store, so two remote operations can never interleave on one builder.
//! Share a builder across tasks through [`SharedBuilder`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::condition::{Condition, ConditionEdit, CrossPreset};
use crate::error::{BuilderError, ValidationError};
use crate::exit::{ExitCondition, ExitPreset, ExitType};
use crate::store::{StoreError, StrategyStore};
use crate::strategy::{SavedStrategy, StrategyConfiguration, StrategySummary};
use crate::types::{Action, ConditionId, Indicator, LogicalOperator, StrategyId};

/// A builder shared between tasks; lock it for the whole of an operation
pub type SharedBuilder<S> = Arc<tokio::sync::Mutex<StrategyBuilder<S>>>;

/// Outcome of a successful save
#[derive(Debug)]
pub struct SaveReport {
    pub strategy: SavedStrategy,
    /// Set when the strategy was stored but the list could not be refreshed
    pub refresh_error: Option<StoreError>,
}

/// Outcome of a successful delete
#[derive(Debug)]
pub struct DeleteReport {
    pub id: StrategyId,
    /// Set when the strategy was deleted but the list could not be refreshed
    pub refresh_error: Option<StoreError>,
}

pub struct StrategyBuilder<S> {
    store: S,
    draft: StrategyConfiguration,
    saved: Vec<StrategySummary>,
    loaded: Option<StrategyId>,
}

impl<S: StrategyStore> StrategyBuilder<S> {
    /// Builder with the canonical default draft and an empty saved list
    pub fn new(store: S) -> Self {
        Self {
            store,
            draft: StrategyConfiguration::canonical_default(),
            saved: Vec::new(),
            loaded: None,
        }
    }

    pub fn shared(self) -> SharedBuilder<S> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn draft(&self) -> &StrategyConfiguration {
        &self.draft
    }

    pub fn saved_strategies(&self) -> &[StrategySummary] {
        &self.saved
    }

    /// Id of the saved strategy the draft came from, if any
    pub fn loaded_strategy(&self) -> Option<StrategyId> {
        self.loaded
    }

    pub fn condition(&self, id: &ConditionId) -> Option<&Condition> {
        self.draft.conditions.iter().find(|c| &c.id == id)
    }

    // ------------------------------------------------------------------
    // Draft editing
    // ------------------------------------------------------------------

    pub fn set_logical_operator(&mut self, operator: LogicalOperator) {
        self.draft.logical_operator = operator;
    }

    pub fn set_action(&mut self, action: Action) {
        self.draft.action = action;
    }

    /// Replace the exit policy wholesale. Out-of-range values are rejected
    /// and the current policy is kept.
    pub fn set_exit_condition(&mut self, exit: ExitCondition) -> Result<(), ValidationError> {
        exit.validate()?;
        self.draft.exit_condition = exit;
        Ok(())
    }

    pub fn apply_exit_preset(&mut self, preset: ExitPreset) {
        self.draft.exit_condition = preset.exit_condition();
    }

    /// Switch the exit type, keeping whatever the new type can reuse
    pub fn set_exit_type(&mut self, exit_type: ExitType) {
        self.draft.exit_condition = self.draft.exit_condition.with_type(exit_type);
    }

    /// Append the default new condition and return its id
    pub fn add_condition(&mut self) -> ConditionId {
        self.push_condition(Condition::new_default())
    }

    /// Append `primary` crossing above `compare`, both with default parameters
    pub fn add_cross_condition(&mut self, primary: Indicator, compare: Indicator) -> ConditionId {
        self.push_condition(Condition::cross(primary, compare, ""))
    }

    pub fn add_cross_preset(&mut self, preset: &CrossPreset) -> ConditionId {
        self.push_condition(preset.condition())
    }

    fn push_condition(&mut self, condition: Condition) -> ConditionId {
        let id = condition.id.clone();
        self.draft.conditions.push(condition);
        id
    }

    /// Apply one edit to the condition with `id`.
    ///
    /// Returns `Ok(false)` when no condition has that id.
    pub fn update_condition(
        &mut self,
        id: &ConditionId,
        edit: ConditionEdit,
    ) -> Result<bool, ValidationError> {
        match self.draft.conditions.iter_mut().find(|c| &c.id == id) {
            Some(condition) => {
                condition.apply(edit)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the condition with `id`; the list may become empty
    pub fn remove_condition(&mut self, id: &ConditionId) -> bool {
        let before = self.draft.conditions.len();
        self.draft.conditions.retain(|c| &c.id != id);
        self.draft.conditions.len() != before
    }

    /// Back to the canonical default draft; the saved list is kept
    pub fn reset_builder(&mut self) {
        self.draft = StrategyConfiguration::canonical_default();
        self.loaded = None;
    }

    /// Replace the draft with a configuration from elsewhere (a file, a
    /// template). Rejected if it holds values the editor would not accept.
    pub fn import_draft(&mut self, configuration: StrategyConfiguration) -> Result<(), ValidationError> {
        for condition in &configuration.conditions {
            condition.indicator.validate()?;
            if let Some(compare) = condition.compare_indicator() {
                compare.validate()?;
            }
        }
        configuration.exit_condition.validate()?;
        self.draft = configuration;
        self.loaded = None;
        Ok(())
    }

    /// Full pre-backtest check of the current draft
    pub fn validate_draft(&self) -> Result<(), ValidationError> {
        self.draft.validate()
    }

    // ------------------------------------------------------------------
    // Store round-trips
    // ------------------------------------------------------------------

    /// Save the draft under `name`.
    ///
    /// Name and condition count are checked first, then the name against the
    /// cached list (ignoring case); nothing reaches the store if either
    /// fails. After the store accepts the strategy the cached list is
    /// refreshed; a failed refresh is reported in the [`SaveReport`] and does
    /// not fail the save.
    pub async fn save_strategy(&mut self, name: &str) -> Result<SaveReport, BuilderError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || self.draft.conditions.is_empty() {
            return Err(ValidationError::MissingNameOrConditions.into());
        }

        let lowered = trimmed.to_lowercase();
        if self.saved.iter().any(|s| s.name.to_lowercase() == lowered) {
            return Err(BuilderError::DuplicateName(trimmed.to_string()));
        }

        let strategy = self.store.create(trimmed, &self.draft).await?;
        info!("Saved strategy '{}' as {}", strategy.name, strategy.id);
        self.loaded = Some(strategy.id);

        let refresh_error = self.fetch_saved_strategies().await.err();
        Ok(SaveReport {
            strategy,
            refresh_error,
        })
    }

    /// Replace the cached list with the store's. On failure the cache is
    /// left as it was.
    pub async fn fetch_saved_strategies(&mut self) -> Result<(), StoreError> {
        match self.store.list().await {
            Ok(strategies) => {
                debug!("Cached {} saved strategies", strategies.len());
                self.saved = strategies;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to fetch strategies: {}", e);
                Err(e)
            }
        }
    }

    /// Fetch a saved strategy and make it the draft.
    ///
    /// Any failure is logged and yields `None` with the draft untouched.
    pub async fn load_strategy(&mut self, id: StrategyId) -> Option<SavedStrategy> {
        match self.store.get(id).await {
            Ok(strategy) => {
                self.draft = strategy.configuration.clone();
                self.loaded = Some(strategy.id);
                info!(
                    "Loaded strategy '{}' ({} conditions)",
                    strategy.name,
                    self.draft.conditions.len()
                );
                Some(strategy)
            }
            Err(e) => {
                warn!("Failed to load strategy {}: {}", id, e);
                None
            }
        }
    }

    /// Delete a saved strategy.
    ///
    /// Does nothing for an unset id. Otherwise the list is refreshed and the
    /// draft reset whether or not the delete succeeded; a failed delete is
    /// returned after that.
    pub async fn delete_strategy(
        &mut self,
        id: StrategyId,
    ) -> Result<Option<DeleteReport>, BuilderError> {
        if !id.is_set() {
            return Ok(None);
        }

        let deleted = self.store.delete(id).await;
        match &deleted {
            Ok(()) => info!("Deleted strategy {}", id),
            Err(e) => warn!("Failed to delete strategy {}: {}", id, e),
        }

        let refresh_error = self.fetch_saved_strategies().await.err();
        self.reset_builder();

        deleted?;
        Ok(Some(DeleteReport { id, refresh_error }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{IndicatorSpec, ParamSide};
    use crate::store::SqliteStrategyStore;
    use crate::types::Operator;

    fn builder() -> StrategyBuilder<SqliteStrategyStore> {
        StrategyBuilder::new(SqliteStrategyStore::in_memory("tester").unwrap())
    }

    #[test]
    fn test_starts_from_canonical_default() {
        let b = builder();
        assert_eq!(b.draft().conditions.len(), 1);
        assert_eq!(b.draft().conditions[0].describe(), "RSI(14) < 30");
        assert!(b.saved_strategies().is_empty());
        assert_eq!(b.loaded_strategy(), None);
    }

    #[test]
    fn test_add_condition_returns_fresh_ids() {
        let mut b = builder();
        let first = b.add_condition();
        let second = b.add_condition();
        assert_ne!(first, second);
        assert_eq!(b.draft().conditions.len(), 3);
        assert_eq!(b.condition(&second).unwrap().value, "Signal Line");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut b = builder();
        let before = b.draft().clone();
        let changed = b
            .update_condition(&ConditionId::new("missing"), ConditionEdit::Value("1".into()))
            .unwrap();
        assert!(!changed);
        assert_eq!(b.draft(), &before);
    }

    #[test]
    fn test_update_touches_only_target() {
        let mut b = builder();
        let first = b.draft().conditions[0].id.clone();
        let added = b.add_condition();
        b.update_condition(
            &added,
            ConditionEdit::Parameter {
                side: ParamSide::Primary,
                name: "signal_period".into(),
                value: 5,
            },
        )
        .unwrap();
        assert_eq!(b.condition(&added).unwrap().indicator.param("signal_period"), Some(5));
        assert_eq!(b.condition(&first).unwrap().indicator, IndicatorSpec::Rsi { period: 14 });
    }

    #[test]
    fn test_rejected_edit_leaves_draft() {
        let mut b = builder();
        let id = b.draft().conditions[0].id.clone();
        let before = b.draft().clone();
        let result = b.update_condition(&id, ConditionEdit::CompareIndicator(Indicator::Sma));
        assert!(result.is_err());
        assert_eq!(b.draft(), &before);
    }

    #[test]
    fn test_remove_to_empty_is_allowed() {
        let mut b = builder();
        let id = b.draft().conditions[0].id.clone();
        assert!(b.remove_condition(&id));
        assert!(b.draft().conditions.is_empty());
        assert!(!b.remove_condition(&id));
    }

    #[test]
    fn test_set_exit_condition_rejects_out_of_range() {
        let mut b = builder();
        let err = b
            .set_exit_condition(ExitCondition::ProfitTarget { value: 80.0 })
            .unwrap_err();
        assert!(matches!(err, ValidationError::ExitValueOutOfRange { .. }));
        assert_eq!(b.draft().exit_condition, ExitCondition::Manual);

        b.apply_exit_preset(ExitPreset::Hold7Days);
        assert_eq!(b.draft().exit_condition.matching_preset(), Some(ExitPreset::Hold7Days));
        b.set_exit_type(ExitType::StopLoss);
        assert_eq!(b.draft().exit_condition, ExitCondition::StopLoss { value: 5.0 });
    }

    #[test]
    fn test_add_cross_condition() {
        let mut b = builder();
        let id = b.add_cross_condition(Indicator::Sma, Indicator::Ema);
        let c = b.condition(&id).unwrap();
        assert_eq!(c.operator(), Operator::CrossesAbove);
        assert_eq!(c.compare_spec(), IndicatorSpec::Ema { period: 20 });
    }

    #[test]
    fn test_import_draft_rejects_out_of_range_params() {
        let mut b = builder();
        let mut config = StrategyConfiguration::canonical_default();
        config.conditions[0].indicator = IndicatorSpec::Rsi { period: 0 };
        assert!(b.import_draft(config).is_err());
        assert_eq!(b.draft().conditions[0].indicator, IndicatorSpec::Rsi { period: 14 });
    }

    #[tokio::test]
    async fn test_save_sets_loaded_and_refreshes() {
        let mut b = builder();
        let report = b.save_strategy("  Oversold  ").await.unwrap();
        assert_eq!(report.strategy.name, "Oversold");
        assert!(report.refresh_error.is_none());
        assert_eq!(b.loaded_strategy(), Some(report.strategy.id));
        assert_eq!(b.saved_strategies().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unset_id_is_noop() {
        let mut b = builder();
        b.set_action(Action::Short);
        assert!(b.delete_strategy(StrategyId(0)).await.unwrap().is_none());
        assert_eq!(b.draft().action, Action::Short);
    }

    #[tokio::test]
    async fn test_shared_builder() {
        let shared = builder().shared();
        let task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut b = shared.lock().await;
                b.save_strategy("From task").await.map(|r| r.strategy.id)
            })
        };
        let id = task.await.unwrap().unwrap();
        let b = shared.lock().await;
        assert_eq!(b.saved_strategies()[0].id, id);
    }
}
