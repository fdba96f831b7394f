use std::collections::HashMap;

use serde_json::Value;

use crate::error::DashError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesLabels(HashMap<String, String>);

impl SpeciesLabels {
    pub fn from_value(value: &Value) -> Result<Self, DashError> {
        let object = value
            .as_object()
            .ok_or_else(|| DashError::LabelsLoad("expected a JSON object".to_string()))?;
        let mut labels = HashMap::with_capacity(object.len());
        for (species, label) in object {
            let label = label
                .as_str()
                .ok_or_else(|| DashError::LabelsLoad(format!("label for {species} is not text")))?;
            labels.insert(species.to_uppercase(), label.to_string());
        }
        Ok(Self(labels))
    }

    pub fn label(&self, species: &str) -> String {
        let code = species.to_uppercase();
        self.0.get(&code).cloned().unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
