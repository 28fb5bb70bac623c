use super::registry::ModelRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    pub requested: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves the model to send for `capability`.
    ///
    /// A registered model lacking the capability falls back to `default`.
    /// Unregistered names are passed through so newer models keep working.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
        default: &str,
    ) -> ModelSelection {
        let Some(requested_value) = requested
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return ModelSelection {
                model: default.to_string(),
                requested: None,
                note: None,
            };
        };

        match self.registry.get(requested_value) {
            Some(model) if model.supports(capability) => ModelSelection {
                model: model.name.clone(),
                requested: Some(requested_value.to_string()),
                note: None,
            },
            Some(_) => ModelSelection {
                model: default.to_string(),
                requested: Some(requested_value.to_string()),
                note: Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'; using '{default}'."
                )),
            },
            None => ModelSelection {
                model: requested_value.to_string(),
                requested: Some(requested_value.to_string()),
                note: Some(format!(
                    "Model '{requested_value}' is not in the registry; sending it unchanged."
                )),
            },
        }
    }
}
