//! Lifecycle notifications and per-operation reports.

use crate::core::TrackError;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Persist,
}

/// Passed to "before apply" / "before persist" handlers.
///
/// Any handler may cancel; the remaining handlers still run, and the
/// operation is skipped if at least one of them cancelled.
#[derive(Debug, Clone)]
pub struct TrackingOperationEvent {
    operation: Operation,
    type_name: String,
    key: String,
    cancel: bool,
}

impl TrackingOperationEvent {
    pub(crate) fn new(operation: Operation, type_name: &str, key: &str) -> Self {
        Self {
            operation,
            type_name: type_name.to_string(),
            key: key.to_string(),
            cancel: false,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Completed,
    /// A "before" handler cancelled the operation.
    Cancelled,
    /// The tracked object no longer exists.
    TargetDropped,
    /// The tracked object was locked when the operation started, e.g. a
    /// trigger raised from inside one of the object's own methods.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyStatus {
    Applied,
    /// Apply found no stored value; the property kept its value.
    NotStored,
    Persisted,
    Failed(TrackError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOutcome {
    pub property: String,
    pub store_key: String,
    pub status: PropertyStatus,
}

/// Result of one Apply or Persist call.
///
/// Failed properties never abort the operation; they are listed here with
/// the error that stopped them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: Operation,
    pub type_name: String,
    pub key: String,
    pub status: OperationStatus,
    pub outcomes: Vec<PropertyOutcome>,
}

impl OperationReport {
    pub(crate) fn skipped(
        operation: Operation,
        type_name: &str,
        key: &str,
        status: OperationStatus,
    ) -> Self {
        Self {
            operation,
            type_name: type_name.to_string(),
            key: key.to_string(),
            status,
            outcomes: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OperationStatus::Completed
    }

    pub fn outcome(&self, property: &str) -> Option<&PropertyOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.property == property)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PropertyOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, PropertyStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Properties actually written to the target or the store.
    pub fn touched(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| {
                matches!(
                    outcome.status,
                    PropertyStatus::Applied | PropertyStatus::Persisted
                )
            })
            .count()
    }
}

pub type BeforeHandler = Arc<dyn Fn(&mut TrackingOperationEvent) + Send + Sync>;
pub type AfterHandler = Arc<dyn Fn(&OperationReport) + Send + Sync>;

#[derive(Default)]
pub(crate) struct LifecycleHooks {
    pub applying: Vec<BeforeHandler>,
    pub applied: Vec<AfterHandler>,
    pub persisting: Vec<BeforeHandler>,
    pub persisted: Vec<AfterHandler>,
}

impl LifecycleHooks {
    pub fn before(&self, operation: Operation) -> Vec<BeforeHandler> {
        match operation {
            Operation::Apply => self.applying.clone(),
            Operation::Persist => self.persisting.clone(),
        }
    }

    pub fn after(&self, operation: Operation) -> Vec<AfterHandler> {
        match operation {
            Operation::Apply => self.applied.clone(),
            Operation::Persist => self.persisted.clone(),
        }
    }
}
