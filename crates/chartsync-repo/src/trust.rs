//! Trust material resolution
//!
//! CA bundles and client certificates are never configured inline. A
//! repository names a config object (CA bundle) and a secret (client
//! certificate and key) and the material is looked up through a
//! [`TrustStore`] on every pass:
//!
//! - A missing object or key fails the pass, no partial trust is assumed
//! - An empty CA bundle falls back to the platform trust anchors
//! - Malformed PEM is rejected before any connection is attempted

use async_trait::async_trait;
use rustls::RootCertStore;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};

/// Key holding the PEM CA bundle in the referenced config object
pub const CA_BUNDLE_KEY: &str = "ca-bundle.crt";

/// Key holding the PEM client certificate in the referenced secret
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Key holding the PEM private key in the referenced secret
pub const TLS_KEY_KEY: &str = "tls.key";

/// Key-value lookup service for external trust objects
///
/// Implementations return `Ok(None)` when the named object does not exist
/// and reserve errors for failed lookups.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Namespace the objects are looked up in (for diagnostics)
    fn namespace(&self) -> &str;

    /// Get the string data of a config object
    async fn config_map(&self, name: &str) -> Result<Option<BTreeMap<String, String>>>;

    /// Get the binary data of a secret
    async fn secret(&self, name: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>>;
}

/// Where the trust anchors of a transport came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// Operating system trust store
    Platform,
    /// CA bundle from the named config object
    Bundle(String),
}

/// Client certificate chain with its private key
pub struct ClientIdentity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Resolved trust material for one pass (never persisted)
pub struct TrustMaterial {
    /// Trust anchors for server verification
    pub roots: RootCertStore,
    /// Where the anchors came from
    pub source: TrustSource,
    /// Optional client certificate for mutual TLS
    pub client_identity: Option<ClientIdentity>,
}

impl std::fmt::Debug for TrustMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustMaterial")
            .field("roots", &self.roots.len())
            .field("source", &self.source)
            .field(
                "client_identity",
                &self.client_identity.as_ref().map(|id| id.cert_chain.len()),
            )
            .finish()
    }
}

impl TrustMaterial {
    /// Trust material backed by the platform trust store only
    pub fn platform() -> Self {
        Self {
            roots: platform_roots(),
            source: TrustSource::Platform,
            client_identity: None,
        }
    }
}

/// Resolve the trust material referenced by a repository
pub async fn resolve_trust<T: TrustStore + ?Sized>(
    repo: &RepositoryConfig,
    store: &T,
) -> Result<TrustMaterial> {
    let mut material = match repo.ca_ref() {
        Some(ca_name) => resolve_ca_bundle(ca_name, store).await?,
        None => TrustMaterial::platform(),
    };

    if let Some(secret_name) = repo.client_cert_ref() {
        material.client_identity = Some(resolve_client_identity(secret_name, store).await?);
    }

    Ok(material)
}

async fn resolve_ca_bundle<T: TrustStore + ?Sized>(name: &str, store: &T) -> Result<TrustMaterial> {
    let data = store
        .config_map(name)
        .await?
        .ok_or_else(|| RepoError::ConfigLookup {
            kind: "ConfigMap",
            name: name.to_string(),
            namespace: store.namespace().to_string(),
            reason: "not found".to_string(),
        })?;

    let bundle = data.get(CA_BUNDLE_KEY).ok_or_else(|| RepoError::ConfigKey {
        kind: "ConfigMap",
        name: name.to_string(),
        key: CA_BUNDLE_KEY.to_string(),
    })?;

    if bundle.trim().is_empty() {
        tracing::debug!(configmap = name, "CA bundle is empty, using platform trust store");
        return Ok(TrustMaterial::platform());
    }

    let source_name = format!("ConfigMap {}/{}", name, CA_BUNDLE_KEY);
    let mut roots = RootCertStore::empty();
    for cert in parse_certificates(bundle.as_bytes(), &source_name)? {
        roots.add(cert).map_err(|e| RepoError::TrustParse {
            source_name: source_name.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(TrustMaterial {
        roots,
        source: TrustSource::Bundle(name.to_string()),
        client_identity: None,
    })
}

async fn resolve_client_identity<T: TrustStore + ?Sized>(
    name: &str,
    store: &T,
) -> Result<ClientIdentity> {
    let data = store
        .secret(name)
        .await?
        .ok_or_else(|| RepoError::ConfigLookup {
            kind: "Secret",
            name: name.to_string(),
            namespace: store.namespace().to_string(),
            reason: "not found".to_string(),
        })?;

    let missing_key = |key: &str| RepoError::ConfigKey {
        kind: "Secret",
        name: name.to_string(),
        key: key.to_string(),
    };
    let cert_pem = data.get(TLS_CERT_KEY).ok_or_else(|| missing_key(TLS_CERT_KEY))?;
    let key_pem = data.get(TLS_KEY_KEY).ok_or_else(|| missing_key(TLS_KEY_KEY))?;

    let cert_chain = parse_certificates(cert_pem, &format!("Secret {}/{}", name, TLS_CERT_KEY))?;
    let key = PrivateKeyDer::from_pem_slice(key_pem).map_err(|e| RepoError::TrustParse {
        source_name: format!("Secret {}/{}", name, TLS_KEY_KEY),
        message: e.to_string(),
    })?;

    Ok(ClientIdentity { cert_chain, key })
}

/// Parse every certificate in a PEM bundle
///
/// A bundle without a single certificate is rejected.
pub fn parse_certificates(pem: &[u8], source_name: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RepoError::TrustParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(RepoError::TrustParse {
            source_name: source_name.to_string(),
            message: "no PEM certificates found".to_string(),
        });
    }

    Ok(certs)
}

/// Load the operating system trust anchors
fn platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(error = %err, "Failed to load platform certificate");
    }

    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    if ignored > 0 {
        tracing::debug!(ignored, "Ignored unparsable platform certificates");
    }
    if added == 0 {
        tracing::warn!("No platform trust anchors found, HTTPS verification will fail");
    }

    roots
}

/// In-memory trust store
///
/// Used for offline runs (where nothing is configured) and in tests.
#[derive(Clone, Default)]
pub struct StaticTrustStore {
    namespace: String,
    config_maps: Arc<RwLock<BTreeMap<String, BTreeMap<String, String>>>>,
    secrets: Arc<RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>,
    lookups: Arc<RwLock<usize>>,
}

impl StaticTrustStore {
    /// Create an empty store
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Add a config object
    pub fn with_config_map<K, V>(self, name: &str, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        if let Ok(mut maps) = self.config_maps.write() {
            maps.insert(
                name.to_string(),
                data.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            );
        }
        self
    }

    /// Add a secret
    pub fn with_secret<K, V>(self, name: &str, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(
                name.to_string(),
                data.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            );
        }
        self
    }

    /// Number of lookups served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.read().map(|n| *n).unwrap_or_default()
    }

    fn record_lookup(&self) {
        if let Ok(mut n) = self.lookups.write() {
            *n += 1;
        }
    }
}

#[async_trait]
impl TrustStore for StaticTrustStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn config_map(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        self.record_lookup();
        Ok(self
            .config_maps
            .read()
            .ok()
            .and_then(|maps| maps.get(name).cloned()))
    }

    async fn secret(&self, name: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        self.record_lookup();
        Ok(self
            .secrets
            .read()
            .ok()
            .and_then(|secrets| secrets.get(name).cloned()))
    }
}
