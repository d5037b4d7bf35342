//! Provider registry with atomic hot-reload and failover queries

use crate::credentials;
use crate::loader::{self, RegistryDocument};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};
use vigil_core::{Category, Error, ProviderConfig, Result};

/// Filter for [`ProviderRegistry::list`]
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only providers in this category
    pub category: Option<Category>,
    /// Only providers with at least this priority score
    pub min_priority: Option<u8>,
    /// Only providers whose credentials are present in the environment
    pub available_only: bool,
}

/// The provider registry
///
/// The provider map is swapped atomically on reload; readers clone an `Arc`
/// and never observe a partially-updated map.
#[derive(Debug)]
pub struct ProviderRegistry {
    path: PathBuf,
    providers: RwLock<Arc<HashMap<String, ProviderConfig>>>,
    last_modified: Mutex<Option<SystemTime>>,
}

impl ProviderRegistry {
    /// Load the registry from a document file
    pub fn load(path: impl Into<PathBuf>) -> Result<(Self, RegistryDocument)> {
        let path = path.into();
        let document = loader::load_document(&path)?;
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

        info!(
            providers = document.providers.len(),
            skipped = document.skipped,
            source = %path.display(),
            "Provider registry loaded"
        );

        let registry = Self {
            path,
            providers: RwLock::new(Arc::new(document.providers.clone())),
            last_modified: Mutex::new(mtime),
        };

        Ok((registry, document))
    }

    /// Re-load the document only if the source changed since the last load
    ///
    /// Returns `true` when a reload actually happened. Calling this twice
    /// with an unchanged source performs at most one parse.
    pub fn reload(&self) -> Result<bool> {
        let mtime = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::Config(format!("Failed to stat registry source: {e}")))?;

        {
            let last = self.last_modified.lock();
            if *last == Some(mtime) {
                debug!(source = %self.path.display(), "Registry source unchanged, skipping reload");
                return Ok(false);
            }
        }

        let document = loader::load_document(&self.path)?;

        // Swap the map, then record the mtime; a failed parse leaves the
        // previous map in place
        *self.providers.write() = Arc::new(document.providers);
        *self.last_modified.lock() = Some(mtime);

        info!(source = %self.path.display(), "Provider registry reloaded");
        Ok(true)
    }

    /// Look up one provider by id
    pub fn get(&self, id: &str) -> Result<ProviderConfig> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(id.to_string()))
    }

    /// Whether the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().contains_key(id)
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry is empty (never true after a successful load)
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// All providers matching the filter, unordered
    pub fn list(&self, filter: &ListFilter) -> Vec<ProviderConfig> {
        self.snapshot()
            .values()
            .filter(|p| filter.category.map_or(true, |c| p.category == c))
            .filter(|p| filter.min_priority.map_or(true, |m| p.priority_score >= m))
            .filter(|p| !filter.available_only || credentials::is_available(p))
            .cloned()
            .collect()
    }

    /// Providers sorted by descending priority, optionally per category
    pub fn list_by_priority(&self, category: Option<Category>, limit: Option<usize>) -> Vec<ProviderConfig> {
        let mut providers = self.list(&ListFilter {
            category,
            ..Default::default()
        });
        providers.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            providers.truncate(limit);
        }
        providers
    }

    /// Ordered failover chain for a category
    ///
    /// Available providers in the category, excluding the given ids, sorted
    /// by descending priority and truncated to `max`.
    pub fn failover_chain(
        &self,
        category: Category,
        exclude: &[String],
        max: usize,
    ) -> Vec<ProviderConfig> {
        let mut chain: Vec<ProviderConfig> = self
            .list(&ListFilter {
                category: Some(category),
                min_priority: None,
                available_only: true,
            })
            .into_iter()
            .filter(|p| !exclude.iter().any(|id| id == &p.id))
            .collect();
        chain.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        chain.truncate(max);
        chain
    }

    /// Ids of all registered providers
    pub fn ids(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Count of providers per category
    pub fn category_counts(&self) -> HashMap<Category, usize> {
        let mut counts = HashMap::new();
        for provider in self.snapshot().values() {
            *counts.entry(provider.category).or_insert(0) += 1;
        }
        counts
    }

    fn snapshot(&self) -> Arc<HashMap<String, ProviderConfig>> {
        self.providers.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOC: &str = r#"
stock_providers:
  alpha:
    name: "Alpha"
    base_url: "https://alpha.example.com"
    health_endpoint: "/h"
    category: stock
    priority_score: 90
  beta:
    name: "Beta"
    base_url: "https://beta.example.com"
    health_endpoint: "/h"
    category: stock
    priority_score: 70
  gamma:
    name: "Gamma"
    base_url: "https://gamma.example.com"
    health_endpoint: "/h"
    category: stock
    priority_score: 80
    required_env_keys: [VIGIL_REGISTRY_TEST_MISSING_KEY]

crypto_providers:
  delta:
    name: "Delta"
    base_url: "https://delta.example.com"
    health_endpoint: "/ping"
    category: crypto
    priority_score: 60
"#;

    fn write_doc(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_and_get() {
        let file = write_doc(DOC);
        let (registry, doc) = ProviderRegistry::load(file.path()).unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(doc.providers.len(), 4);
        assert_eq!(registry.get("alpha").unwrap().name, "Alpha");
        assert!(matches!(
            registry.get("missing"),
            Err(Error::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_list_filters() {
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();

        let stocks = registry.list(&ListFilter {
            category: Some(Category::Stock),
            ..Default::default()
        });
        assert_eq!(stocks.len(), 3);

        let high_priority = registry.list(&ListFilter {
            min_priority: Some(80),
            ..Default::default()
        });
        assert_eq!(high_priority.len(), 2);

        std::env::remove_var("VIGIL_REGISTRY_TEST_MISSING_KEY");
        let available = registry.list(&ListFilter {
            category: Some(Category::Stock),
            available_only: true,
            ..Default::default()
        });
        // gamma requires a credential that is not set
        assert_eq!(available.len(), 2);
    }

    #[test]
    fn test_list_by_priority_descending() {
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();

        let ordered = registry.list_by_priority(Some(Category::Stock), None);
        let ids: Vec<&str> = ordered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "gamma", "beta"]);

        let top = registry.list_by_priority(Some(Category::Stock), Some(1));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "alpha");
    }

    #[test]
    fn test_failover_chain_excludes_and_truncates() {
        std::env::remove_var("VIGIL_REGISTRY_TEST_MISSING_KEY");
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();

        let chain = registry.failover_chain(Category::Stock, &["alpha".to_string()], 5);
        let ids: Vec<&str> = chain.iter().map(|p| p.id.as_str()).collect();
        // gamma is unavailable (missing credential), alpha is excluded
        assert_eq!(ids, vec!["beta"]);

        let chain = registry.failover_chain(Category::Stock, &[], 1);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, "alpha");
    }

    #[test]
    fn test_reload_is_idempotent_for_unchanged_source() {
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();

        assert!(!registry.reload().unwrap());
        assert!(!registry.reload().unwrap());
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 4);

        // Rewrite with a different set and a newer mtime
        std::thread::sleep(std::time::Duration::from_millis(20));
        let changed = r#"
stock_providers:
  omega:
    name: "Omega"
    base_url: "https://omega.example.com"
    health_endpoint: "/h"
    category: stock
"#;
        std::fs::write(file.path(), changed).unwrap();
        filetime_touch(file.path());

        assert!(registry.reload().unwrap());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("omega"));
    }

    // Some filesystems have coarse mtime resolution; force it forward.
    fn filetime_touch(path: &std::path::Path) {
        let file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        let _ = file.set_modified(SystemTime::now());
    }

    #[test]
    fn test_category_counts() {
        let file = write_doc(DOC);
        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();

        let counts = registry.category_counts();
        assert_eq!(counts[&Category::Stock], 3);
        assert_eq!(counts[&Category::Crypto], 1);
    }
}
