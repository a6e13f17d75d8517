//! Function discovery: images are discovered from an OCI repository;
//! keyword and description metadata is curated locally and merged in,
//! since it isn't
//! reliably attached to an arbitrary registry's image tags.

use kpt_errors::Error;
use oci_distribution::secrets::RegistryAuth;

/// A discovered function, read-only from the caller's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub image: String,
    pub keywords: Vec<String>,
    pub description: String,
}

/// Local metadata merged onto a discovered image reference, keyed by the
/// image reference exactly as the registry reports it.
#[derive(Debug, Clone, Default)]
pub struct FunctionMetadata {
    pub keywords: Vec<String>,
    pub description: String,
}

/// The read-only set of functions known to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct FunctionCatalog {
    functions: Vec<FunctionRef>,
}

impl FunctionCatalog {
    /// Discovers every tag in `registry/repository` and merges in curated
    /// metadata for images `metadata` names; undescribed images are kept
    /// with empty keywords rather than dropped.
    pub async fn discover(
        registry: &str,
        repository: &str,
        auth: &RegistryAuth,
        metadata: &std::collections::HashMap<String, FunctionMetadata>,
    ) -> Result<Self, Error> {
        let images = kpt_oci::discover_functions(registry, repository, auth).await?;
        let functions = images
            .into_iter()
            .map(|image| {
                let curated = metadata.get(&image).cloned().unwrap_or_default();
                FunctionRef { image, keywords: curated.keywords, description: curated.description }
            })
            .collect();
        Ok(Self { functions })
    }

    pub fn all(&self) -> &[FunctionRef] {
        &self.functions
    }

    pub fn find_by_keyword(&self, keyword: &str) -> Vec<&FunctionRef> {
        self.functions.iter().filter(|f| f.keywords.iter().any(|k| k == keyword)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_keyword() {
        let catalog = FunctionCatalog {
            functions: vec![
                FunctionRef { image: "a:v1".to_owned(), keywords: vec!["validate".to_owned()], description: String::new() },
                FunctionRef { image: "b:v1".to_owned(), keywords: vec!["mutate".to_owned()], description: String::new() },
            ],
        };
        let found = catalog.find_by_keyword("validate");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].image, "a:v1");
    }
}
