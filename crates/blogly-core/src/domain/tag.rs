use serde::{Deserialize, Serialize};

use crate::domain::{TagId, require_non_blank};
use crate::error::StoreResult;

/// Tag entity - a label shared across posts. Names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Input for creating a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
}

impl NewTag {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("name", &self.name)
    }
}

/// Replacement name for an existing tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTag {
    pub name: String,
}

impl UpdateTag {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("name", &self.name)
    }
}
