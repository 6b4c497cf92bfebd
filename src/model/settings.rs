use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// User-editable assistant connection, stored with the lab data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_limit: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.7,
            max_tokens: 1024,
            history_limit: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub assistant: AssistantSettings,
    pub mind_map_spacing: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assistant: AssistantSettings::default(),
            mind_map_spacing: 180.0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let assistant = &self.assistant;
        if !(0.0..=2.0).contains(&assistant.temperature) {
            return Err(ValidationError::invalid(
                "assistant.temperature",
                "must be between 0 and 2",
            ));
        }
        if assistant.max_tokens == 0 {
            return Err(ValidationError::invalid("assistant.maxTokens", "must be > 0"));
        }
        if assistant.model.trim().is_empty() {
            return Err(ValidationError::required("assistant.model"));
        }
        if !self.mind_map_spacing.is_finite() || self.mind_map_spacing <= 0.0 {
            return Err(ValidationError::invalid("mindMapSpacing", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_values_name_their_field() {
        let mut settings = Settings::default();
        settings.assistant.temperature = 3.5;
        assert_eq!(
            settings.validate().unwrap_err().field,
            "assistant.temperature"
        );

        let mut settings = Settings::default();
        settings.mind_map_spacing = f32::NAN;
        assert_eq!(settings.validate().unwrap_err().field, "mindMapSpacing");
    }
}
