//! Hardened HTTP transport for repository access
//!
//! Every client built here:
//! - Negotiates TLS 1.2 or newer only
//! - Offers a fixed list of AEAD cipher suites with forward secrecy
//! - Verifies servers against the resolved trust material
//! - Presents a client certificate when one is configured
//! - Honors `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment

use rustls::crypto::{CryptoProvider, ring};
use rustls::{ClientConfig, SupportedCipherSuite};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::trust::{TrustMaterial, TrustStore, resolve_trust};

/// Default timeout for index requests (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing a connection (10 seconds)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cipher suites offered to repositories, in order of preference
pub static PREFERRED_CIPHER_SUITES: &[SupportedCipherSuite] = &[
    // TLS 1.3
    ring::cipher_suite::TLS13_AES_128_GCM_SHA256,
    ring::cipher_suite::TLS13_AES_256_GCM_SHA384,
    ring::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
    // TLS 1.2, ECDHE + AEAD only
    ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    ring::cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
];

const USER_AGENT: &str = concat!("chartsync/", env!("CARGO_PKG_VERSION"));

/// Builds HTTP clients from repository trust references
#[derive(Debug, Clone)]
pub struct SecureClientBuilder {
    timeout: Duration,
}

impl Default for SecureClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl SecureClientBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for a whole request, body included
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the repository's trust references and build a client
    ///
    /// Lookup failures surface before any network activity.
    pub async fn build_for<T: TrustStore + ?Sized>(
        &self,
        repo: &RepositoryConfig,
        store: &T,
    ) -> Result<reqwest::Client> {
        let material = resolve_trust(repo, store).await?;
        tracing::debug!(
            repository = %repo.name,
            source = ?material.source,
            client_auth = material.client_identity.is_some(),
            "Resolved trust material"
        );
        self.build(material)
    }

    /// Build a client from already resolved trust material
    pub fn build(&self, material: TrustMaterial) -> Result<reqwest::Client> {
        let tls = tls_config(material)?;

        // Proxies from the environment are picked up by default.
        reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(self.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(self.timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RepoError::Transport {
                message: e.to_string(),
            })
    }
}

/// Crypto provider restricted to the preferred cipher suites
pub fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: PREFERRED_CIPHER_SUITES.to_vec(),
        ..ring::default_provider()
    }
}

/// Build the rustls client configuration for the given trust material
pub fn tls_config(material: TrustMaterial) -> Result<ClientConfig> {
    let builder = ClientConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| RepoError::Transport {
            message: e.to_string(),
        })?
        .with_root_certificates(material.roots);

    let mut config = match material.client_identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.cert_chain, identity.key)
            .map_err(|e| RepoError::TrustParse {
                source_name: "client certificate".to_string(),
                message: e.to_string(),
            })?,
        None => builder.with_no_client_auth(),
    };

    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::fixtures::*;
    use crate::trust::{
        CA_BUNDLE_KEY, ClientIdentity, StaticTrustStore, TLS_CERT_KEY, TLS_KEY_KEY, TrustSource,
        parse_certificates,
    };
    use rustls::pki_types::PrivateKeyDer;
    use rustls::pki_types::pem::PemObject;

    #[test]
    fn test_provider_offers_only_preferred_suites() {
        let provider = crypto_provider();
        assert_eq!(provider.cipher_suites.len(), PREFERRED_CIPHER_SUITES.len());
        for suite in &provider.cipher_suites {
            let name = format!("{:?}", suite.suite());
            assert!(
                name.contains("GCM") || name.contains("CHACHA20"),
                "unexpected suite {}",
                name
            );
        }
    }

    #[test]
    fn test_tls_config_without_client_auth() {
        let config = tls_config(TrustMaterial::platform()).unwrap();
        assert!(!config.client_auth_cert_resolver.has_certs());
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_tls_config_with_client_auth() {
        let mut material = TrustMaterial::platform();
        material.client_identity = Some(ClientIdentity {
            cert_chain: parse_certificates(CLIENT_CERT.as_bytes(), "test").unwrap(),
            key: PrivateKeyDer::from_pem_slice(CLIENT_KEY.as_bytes()).unwrap(),
        });

        let config = tls_config(material).unwrap();
        assert!(config.client_auth_cert_resolver.has_certs());
    }

    #[tokio::test]
    async fn test_build_for_with_full_trust() {
        let store = StaticTrustStore::new("openshift-config")
            .with_config_map("custom-ca", [(CA_BUNDLE_KEY, CA_CERT)])
            .with_secret(
                "client-tls",
                [(TLS_CERT_KEY, CLIENT_CERT.as_bytes()), (TLS_KEY_KEY, CLIENT_KEY.as_bytes())],
            );
        let repo = RepositoryConfig::new("private", "https://charts.example.com")
            .with_ca_ref("custom-ca")
            .with_client_cert_ref("client-tls");

        let material = resolve_trust(&repo, &store).await.unwrap();
        assert_eq!(material.source, TrustSource::Bundle("custom-ca".to_string()));

        assert!(SecureClientBuilder::new().build_for(&repo, &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_build_for_missing_ca_fails_before_network() {
        let store = StaticTrustStore::new("openshift-config");
        let repo = RepositoryConfig::new("private", "https://charts.example.com")
            .with_ca_ref("does-not-exist");

        let err = SecureClientBuilder::new()
            .build_for(&repo, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ConfigLookup { .. }));
    }
}
