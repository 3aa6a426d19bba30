use serde::{Deserialize, Serialize};

use crate::db::Entity;

/// A named group of captures.
///
/// `item_ids` reference captures by id. Nothing checks that the referenced
/// captures exist, and deleting a capture does not touch collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub item_ids: Vec<String>,
    pub created_at: i64,
}

impl Collection {
    pub fn new(input: CreateCollectionInput) -> Self {
        Self {
            id: super::new_id(),
            name: input.name,
            item_ids: input.item_ids,
            created_at: super::now_millis(),
        }
    }
}

impl Entity for Collection {
    type Changes = UpdateCollectionInput;

    const KIND: &'static str = "collection";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, changes: UpdateCollectionInput) {
        self.name = changes.name;
        if let Some(item_ids) = changes.item_ids {
            self.item_ids = item_ids;
        }
    }
}

/// Input for creating a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item_ids: Vec<String>,
}

/// Input for updating a collection. `item_ids` replaces the list when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionInput {
    #[serde(default)]
    pub name: String,
    pub item_ids: Option<Vec<String>>,
}
