//! # Definition Registry
//!
//! Per-task-type policy management. Names are validated here, at the request
//! boundary; absent policy fields are filled from the configured defaults.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::config::QueueSettings;
use crate::constants::operations;
use crate::error::{QueueError, QueueResult};
use crate::models::{DefinitionPolicy, TaskDefinition};
use crate::store::QueueStore;
use crate::validation;

#[derive(Debug, Clone)]
pub struct DefinitionRegistry {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl DefinitionRegistry {
    pub fn new(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>, settings: QueueSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    fn build(&self, name: &str, policy: &DefinitionPolicy) -> TaskDefinition {
        let filled = self.settings.apply_defaults(policy);
        TaskDefinition::from_policy(name, &filled, self.clock.now())
    }

    /// Register a new definition; an existing name is a `Conflict`.
    #[instrument(skip(self, policy), fields(definition = %name))]
    pub async fn create_definition(
        &self,
        name: &str,
        policy: &DefinitionPolicy,
    ) -> QueueResult<TaskDefinition> {
        validation::validate_definition(name, policy)?;

        let definition = self
            .store
            .insert_definition(&self.build(name, policy))
            .await?;

        info!(
            operation = operations::CREATE_DEFINITION,
            max_attempts = definition.max_attempts,
            timeout_seconds = definition.default_timeout_seconds,
            "Task definition created"
        );
        Ok(definition)
    }

    /// Create-or-return: an existing definition is returned untouched.
    #[instrument(skip(self, policy), fields(definition = %name))]
    pub async fn upsert_definition(
        &self,
        name: &str,
        policy: &DefinitionPolicy,
    ) -> QueueResult<TaskDefinition> {
        validation::validate_definition(name, policy)?;
        self.store.upsert_definition(&self.build(name, policy)).await
    }

    /// Fetch a definition, creating it with defaults on first use.
    ///
    /// `precheck` sees the would-be definition before it is stored, so a
    /// request it rejects leaves no definition behind. It runs again on the
    /// stored row, which may come from a concurrent creator.
    pub async fn ensure_definition<F>(&self, name: &str, precheck: F) -> QueueResult<TaskDefinition>
    where
        F: Fn(&TaskDefinition) -> QueueResult<()>,
    {
        if let Some(existing) = self.store.get_definition(name).await? {
            precheck(&existing)?;
            return Ok(existing);
        }

        let policy = DefinitionPolicy::default();
        precheck(&self.build(name, &policy))?;

        debug!(definition = %name, "Auto-creating task definition on first enqueue");
        let stored = self.upsert_definition(name, &policy).await?;
        precheck(&stored)?;
        Ok(stored)
    }

    /// Overlay the supplied policy fields; `name` never changes.
    #[instrument(skip(self, policy), fields(definition = %name))]
    pub async fn update_definition(
        &self,
        name: &str,
        policy: &DefinitionPolicy,
    ) -> QueueResult<TaskDefinition> {
        validation::validate_definition(name, policy)?;

        let mut definition = self.get_definition(name).await?;
        definition.merge_policy(policy, self.clock.now());

        let updated = self
            .store
            .update_definition(&definition)
            .await?
            .ok_or_else(|| QueueError::DefinitionNotFound(name.to_string()))?;

        info!(
            operation = operations::UPDATE_DEFINITION,
            max_attempts = updated.max_attempts,
            timeout_seconds = updated.default_timeout_seconds,
            "Task definition updated"
        );
        Ok(updated)
    }

    pub async fn get_definition(&self, name: &str) -> QueueResult<TaskDefinition> {
        self.store
            .get_definition(name)
            .await?
            .ok_or_else(|| QueueError::DefinitionNotFound(name.to_string()))
    }

    pub async fn list_definitions(&self) -> QueueResult<Vec<TaskDefinition>> {
        self.store.list_definitions().await
    }
}
