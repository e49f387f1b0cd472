use std::fmt;
use std::sync::Arc;
use vigil_core::{Change, ChangeKind};

/// Predicate applied to a change after the kind mask matched.
pub type Predicate = Arc<dyn Fn(&Change) -> bool + Send + Sync>;

/// One subscription criterion: an entity type, a kind mask, and an optional
/// predicate over the change itself.
#[derive(Clone)]
pub struct Selector {
    pub(crate) entity_type: String,
    pub(crate) mask: ChangeKind,
    pub(crate) predicate: Option<Predicate>,
}

impl Selector {
    /// Match every change of `entity_type` whose kind intersects `mask`.
    pub fn topic(entity_type: impl Into<String>, mask: ChangeKind) -> Self {
        Self {
            entity_type: entity_type.into(),
            mask,
            predicate: None,
        }
    }

    /// Like [`topic`](Self::topic), further narrowed by `predicate`.
    pub fn filtered<F>(entity_type: impl Into<String>, mask: ChangeKind, predicate: F) -> Self
    where
        F: Fn(&Change) -> bool + Send + Sync + 'static,
    {
        Self {
            entity_type: entity_type.into(),
            mask,
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn mask(&self) -> ChangeKind {
        self.mask
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("entity_type", &self.entity_type)
            .field("mask", &self.mask.to_string())
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
