//! StaticDomainCache - 固定の domain ID → ドメイン名テーブル

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::DomainCacheError;
use crate::ports::DomainCache;

#[derive(Default)]
pub struct StaticDomainCache {
    names: RwLock<HashMap<String, String>>,
}

impl StaticDomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, domain_id: impl Into<String>, name: impl Into<String>) {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.insert(domain_id.into(), name.into());
    }

    /// Forget a domain, as if it had been deleted.
    pub fn remove(&self, domain_id: &str) -> Option<String> {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.remove(domain_id)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticDomainCache {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            names: RwLock::new(names),
        }
    }
}

impl DomainCache for StaticDomainCache {
    fn domain_name(&self, domain_id: &str) -> Result<String, DomainCacheError> {
        let names = self
            .names
            .read()
            .map_err(|_| DomainCacheError::Unavailable("domain table lock poisoned".to_string()))?;
        names
            .get(domain_id)
            .cloned()
            .ok_or_else(|| DomainCacheError::NotFound(domain_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_domains_only() {
        let cache: StaticDomainCache = [("d1", "tenant-one")].into_iter().collect();
        assert_eq!(cache.domain_name("d1").unwrap(), "tenant-one");
        assert_eq!(
            cache.domain_name("d2"),
            Err(DomainCacheError::NotFound("d2".into()))
        );

        cache.remove("d1");
        assert!(cache.domain_name("d1").is_err());
    }
}
