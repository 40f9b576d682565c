use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::slot::SlotDefinition;

/// A parameterized prompt: text with `{{name}}` placeholders and the slot
/// definitions that fill them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub base_prompt: String,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

impl Template {
    pub fn new(id: impl Into<String>, base_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            base_prompt: base_prompt.into(),
            slots: Vec::new(),
        }
    }

    pub fn with_slot(mut self, slot: SlotDefinition) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn slot(&self, id: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Slots whose placeholder occurs literally in the base prompt.
    pub fn referenced_slots(&self) -> impl Iterator<Item = &SlotDefinition> {
        self.slots
            .iter()
            .filter(|s| self.base_prompt.contains(&s.placeholder()))
    }
}
