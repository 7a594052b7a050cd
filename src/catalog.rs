//! Model catalog parsing for the options page

use crate::error::CatalogError;
use crate::models::ModelList;
use crate::paths::CATALOG_MODEL_PREFIX;
use crate::platform::CatalogSource;

/// Sorted, de-duplicated model ids offered in the model list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    ids: Vec<String>,
}

impl Catalog {
    /// Parses a `{ "data": [{ "id": ... }] }` listing and keeps chat models
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let listing: ModelList =
            serde_json::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut ids: Vec<String> = listing
            .data
            .into_iter()
            .map(|entry| entry.id)
            .filter(|id| id.starts_with(CATALOG_MODEL_PREFIX))
            .collect();
        ids.sort();
        ids.dedup();

        Ok(Self { ids })
    }

    pub async fn load(source: &impl CatalogSource) -> Result<Self, CatalogError> {
        let raw = source.fetch().await?;
        Self::parse(&raw)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, model: &str) -> bool {
        self.ids.iter().any(|id| id == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_prefixed_models_sorted() {
        let raw = r#"{
            "object": "list",
            "data": [
                { "id": "gpt-4o", "object": "model" },
                { "id": "whisper-1", "object": "model" },
                { "id": "gpt-3.5-turbo", "object": "model" },
                { "id": "dall-e-3", "object": "model" },
                { "id": "gpt-4", "object": "model" },
                { "id": "gpt-4", "object": "model" }
            ]
        }"#;

        let catalog = Catalog::parse(raw).unwrap();
        assert_eq!(catalog.ids(), ["gpt-3.5-turbo", "gpt-4", "gpt-4o"]);
        assert!(catalog.contains("gpt-4"));
        assert!(!catalog.contains("whisper-1"));
    }

    #[test]
    fn rejects_documents_without_data() {
        let err = Catalog::parse(r#"{ "models": [] }"#).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn bundled_catalog_parses() {
        let catalog = Catalog::parse(include_str!("../extension/models.json")).unwrap();
        assert!(catalog.contains("gpt-3.5-turbo"));
        assert!(catalog.ids().iter().all(|id| id.starts_with("gpt-")));
    }
}
