//! Snapshot sampling and diffing

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::ControlConfig;
use crate::control::{Control, Value};
use crate::traits::{FeedbackSink, InputSource};

/// Every control's value at one instant, keyed by control id
pub type Snapshot = BTreeMap<String, Value>;

/// Ids whose value changed, mapped to the new value
pub type Diff = BTreeMap<String, Value>;

/// Compute the changes from `prev` to `next`
///
/// Only keys already present in `prev` are considered. The control set is
/// fixed at startup, so after the first cycle `prev` always holds every id.
pub fn diff(prev: &Snapshot, next: &Snapshot) -> Diff {
    prev.iter()
        .filter_map(|(id, old)| match next.get(id) {
            Some(new) if new != old => Some((id.clone(), new.clone())),
            _ => None,
        })
        .collect()
}

/// One control as announced to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CatalogEntry {
    pub id: String,
    /// String form of the value at announce time
    pub state: String,
    pub actions: BTreeMap<String, String>,
}

/// Samples every registered control into a snapshot
#[derive(Debug, Clone)]
pub struct StateSampler {
    controls: Vec<Control>,
}

impl StateSampler {
    /// Register the configured controls, keeping their order
    pub fn from_config(controls: &[ControlConfig]) -> Self {
        Self {
            controls: controls.iter().map(Control::from_config).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Sample every control in registration order
    ///
    /// Local feedback produced by the controls goes to `feedback`, so the
    /// sampling cadence is also the feedback cadence.
    pub fn generate<I, F>(&mut self, input: &I, feedback: &mut F) -> Snapshot
    where
        I: InputSource + ?Sized,
        F: FeedbackSink + ?Sized,
    {
        self.controls
            .iter_mut()
            .map(|control| {
                let value = control.sample(input, feedback).clone();
                (control.id().to_string(), value)
            })
            .collect()
    }

    /// The full control catalog with current values
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.controls
            .iter()
            .map(|control| CatalogEntry {
                id: control.id().to_string(),
                state: control.value().to_string(),
                actions: control.actions().clone(),
            })
            .collect()
    }
}
