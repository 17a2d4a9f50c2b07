//! DomainCache port - domain ID からドメイン名への解決

use crate::domain::DomainCacheError;

/// Resolves a domain (tenant) id to its name.
///
/// Any error is fatal for the single operation that needed the name; the
/// scavenger never retries a resolution.
pub trait DomainCache: Send + Sync {
    fn domain_name(&self, domain_id: &str) -> Result<String, DomainCacheError>;
}
