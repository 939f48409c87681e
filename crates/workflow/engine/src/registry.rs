//! Definition registry: versioned storage and lifecycle for definitions
//!
//! Every version of a definition is kept. A definition must pass
//! validation to move from Draft to Active; activating a version
//! deprecates the previously Active one. Running instances stay bound
//! to the exact version they started with, so deprecated versions are
//! never removed while the registry lives.

use limsflow_types::{
    DefinitionStatus, WorkflowDefinition, WorkflowDefinitionId, WorkflowError, WorkflowResult,
};
use limsflow_validate::{validate, ValidationReport};
use std::collections::HashMap;

/// Registry of workflow definitions, keyed by (id, version)
#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<(WorkflowDefinitionId, u32), WorkflowDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Draft definition. Structure is not checked here;
    /// validation gates activation, not registration.
    pub fn register(&mut self, definition: WorkflowDefinition) -> WorkflowResult<()> {
        let key = (definition.id.clone(), definition.version);
        if self.definitions.contains_key(&key) {
            return Err(WorkflowError::Store(format!(
                "definition {} v{} is already registered",
                key.0, key.1
            )));
        }

        tracing::info!(
            definition_id = %definition.id,
            version = definition.version,
            "Workflow definition registered"
        );
        self.definitions.insert(key, definition);
        Ok(())
    }

    /// Validate and activate a version. Any validation issue aborts
    /// the activation. On success the previously Active version (if
    /// any) becomes Deprecated.
    pub fn activate(
        &mut self,
        id: &WorkflowDefinitionId,
        version: u32,
    ) -> WorkflowResult<ValidationReport> {
        let definition = self
            .definitions
            .get(&(id.clone(), version))
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))?;

        let report = validate(definition);
        if !report.is_valid() {
            return Err(WorkflowError::ValidationFailed {
                issue_count: report.issues.len(),
                summary: report.summary(),
            });
        }

        for ((def_id, _), def) in self.definitions.iter_mut() {
            if def_id == id && def.status == DefinitionStatus::Active {
                def.status = DefinitionStatus::Deprecated;
                tracing::info!(
                    definition_id = %def_id,
                    version = def.version,
                    "Workflow definition deprecated"
                );
            }
        }

        if let Some(def) = self.definitions.get_mut(&(id.clone(), version)) {
            def.status = DefinitionStatus::Active;
        }
        tracing::info!(
            definition_id = %id,
            version,
            "Workflow definition activated"
        );
        Ok(report)
    }

    /// Mark a version Deprecated without activating a replacement.
    pub fn deprecate(&mut self, id: &WorkflowDefinitionId, version: u32) -> WorkflowResult<()> {
        let def = self
            .definitions
            .get_mut(&(id.clone(), version))
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))?;
        def.status = DefinitionStatus::Deprecated;
        Ok(())
    }

    /// Get an exact version.
    pub fn get(
        &self,
        id: &WorkflowDefinitionId,
        version: u32,
    ) -> WorkflowResult<&WorkflowDefinition> {
        self.definitions
            .get(&(id.clone(), version))
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))
    }

    /// The currently Active version of a definition, if any.
    pub fn get_active(&self, id: &WorkflowDefinitionId) -> WorkflowResult<&WorkflowDefinition> {
        self.definitions
            .values()
            .find(|d| &d.id == id && d.status == DefinitionStatus::Active)
            .ok_or_else(|| {
                // Distinguish "never registered" from "no active version".
                match self.latest_version(id) {
                    Some(version) => WorkflowError::DefinitionNotActive {
                        id: id.clone(),
                        version,
                    },
                    None => WorkflowError::DefinitionNotFound(id.clone()),
                }
            })
    }

    /// The highest registered version number of a definition.
    pub fn latest_version(&self, id: &WorkflowDefinitionId) -> Option<u32> {
        self.definitions
            .keys()
            .filter(|(def_id, _)| def_id == id)
            .map(|(_, version)| *version)
            .max()
    }

    /// All versions of a definition, oldest first.
    pub fn versions(&self, id: &WorkflowDefinitionId) -> Vec<&WorkflowDefinition> {
        let mut versions: Vec<&WorkflowDefinition> = self
            .definitions
            .values()
            .filter(|d| &d.id == id)
            .collect();
        versions.sort_by_key(|d| d.version);
        versions
    }

    pub fn list(&self) -> Vec<&WorkflowDefinition> {
        self.definitions.values().collect()
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    pub fn contains(&self, id: &WorkflowDefinitionId, version: u32) -> bool {
        self.definitions.contains_key(&(id.clone(), version))
    }
}
