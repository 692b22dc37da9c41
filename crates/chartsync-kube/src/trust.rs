//! Trust objects read from the cluster
//!
//! CA bundles come from ConfigMaps and client certificates from Secrets, all
//! in one configuration namespace.

use async_trait::async_trait;
use chartsync_repo::{RepoError, TrustStore};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::Client;
use std::collections::BTreeMap;

/// Default namespace holding trust objects
pub const DEFAULT_CONFIG_NAMESPACE: &str = "openshift-config";

/// Trust store backed by ConfigMaps and Secrets
#[derive(Clone)]
pub struct KubeTrustStore {
    client: Client,
    namespace: String,
}

impl KubeTrustStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn lookup_error(&self, kind: &'static str, name: &str, err: kube::Error) -> RepoError {
        RepoError::ConfigLookup {
            kind,
            name: name.to_string(),
            namespace: self.namespace.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl TrustStore for KubeTrustStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn config_map(&self, name: &str) -> chartsync_repo::Result<Option<BTreeMap<String, String>>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let config_map = api
            .get_opt(name)
            .await
            .map_err(|e| self.lookup_error("ConfigMap", name, e))?;

        Ok(config_map.map(|cm| cm.data.unwrap_or_default()))
    }

    async fn secret(&self, name: &str) -> chartsync_repo::Result<Option<BTreeMap<String, Vec<u8>>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|e| self.lookup_error("Secret", name, e))?;

        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}
