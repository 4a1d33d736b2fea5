//! Discovery of redeployed dependencies.
//!
//! After a deploy, a manifest's `_services` may hold placeholders for
//! dependencies that were being redeployed. The [`Discoverer`] polls the
//! registry until each placeholder can be swapped for a live url.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{FleetError, Result};
use crate::manifest::{Manifest, ServiceRef};
use crate::registry::{DeploymentRecord, RegistryClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub struct Discoverer {
    registry: Arc<dyn RegistryClient>,
    interval: Duration,
    max_attempts: Option<NonZeroU32>,
}

impl Discoverer {
    /// Unbounded discoverer polling every `interval`.
    pub fn new(registry: Arc<dyn RegistryClient>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            max_attempts: None,
        }
    }

    /// Give up after `attempts` registry scans; `None` polls forever.
    pub fn with_max_attempts(mut self, attempts: Option<NonZeroU32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    /// Poll until every dependency of `manifest` is a concrete url.
    ///
    /// A manifest with no placeholders is returned as is, without querying
    /// the registry. Registry errors end discovery immediately.
    pub async fn discover(&self, mut manifest: Manifest) -> Result<Manifest> {
        if manifest.pending_services().is_empty() {
            return Ok(manifest);
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let records = self.registry.list_deployments().await?;
            let pending = resolve_pending(&mut manifest, &records);

            if pending.is_empty() {
                info!(attempts, "all services discovered");
                return Ok(manifest);
            }

            if let Some(max) = self.max_attempts
                && attempts >= max.get()
            {
                return Err(FleetError::DiscoveryExhausted { attempts, pending });
            }

            debug!(attempts, ?pending, "services not yet discovered");
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Swap every placeholder with a qualifying record for its url.
///
/// A record qualifies when name, version and environment match and it was
/// created strictly after the placeholder's floor; the newest one wins.
/// Returns the names still pending.
pub fn resolve_pending(manifest: &mut Manifest, records: &[DeploymentRecord]) -> Vec<String> {
    let env = manifest.env.clone().unwrap_or_default();
    let Some(services) = manifest.resolved_services.as_mut() else {
        return Vec::new();
    };

    let mut pending = Vec::new();
    for (name, service) in services.iter_mut() {
        let ServiceRef::Pending { version, since } = service else {
            continue;
        };

        let found = records
            .iter()
            .filter(|record| {
                record.name == *name
                    && record.version == *version
                    && record.environment == env
                    && record.created > *since
            })
            .max_by_key(|record| record.created);

        match found {
            Some(record) => {
                debug!(service = %name, url = %record.url, "discovered");
                *service = ServiceRef::Resolved(record.url.clone());
            }
            None => pending.push(name.clone()),
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn manifest() -> Manifest {
        let mut services = BTreeMap::new();
        services.insert("s2".to_string(), ServiceRef::Resolved("u8.sh".to_string()));
        services.insert("s3".to_string(), ServiceRef::pending("1", 11));
        let mut manifest = Manifest::new("s1", "2");
        manifest.resolved_services = Some(services);
        manifest.env = Some("a=b&c=d".to_string());
        manifest
    }

    #[test]
    fn record_at_floor_does_not_qualify() {
        let mut manifest = manifest();
        let records = vec![DeploymentRecord::new("s3", "1", "a=b&c=d", "u9.sh", 11)];
        assert_eq!(resolve_pending(&mut manifest, &records), vec!["s3"]);
    }

    #[test]
    fn other_environment_does_not_qualify() {
        let mut manifest = manifest();
        let records = vec![DeploymentRecord::new("s3", "1", "a=b", "u12.sh", 12)];
        assert_eq!(resolve_pending(&mut manifest, &records), vec!["s3"]);
    }

    #[test]
    fn newest_qualifying_record_wins() {
        let mut manifest = manifest();
        let records = vec![
            DeploymentRecord::new("s3", "1", "a=b&c=d", "u12.sh", 12),
            DeploymentRecord::new("s3", "1", "a=b&c=d", "u13.sh", 13),
            DeploymentRecord::new("s3", "2", "a=b&c=d", "u14.sh", 14),
        ];
        assert!(resolve_pending(&mut manifest, &records).is_empty());

        let services = manifest.resolved_services.unwrap();
        assert_eq!(services["s3"].url(), Some("u13.sh"));
        assert_eq!(services["s2"].url(), Some("u8.sh"));
    }
}
