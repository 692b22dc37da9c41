//! Chart repository access for chartsync
//!
//! Everything needed to turn a repository definition into an ordered,
//! URL-resolved view of its charts:
//!
//! - **Trust resolution**: CA bundles and client certificates looked up by reference
//! - **Secure transport**: TLS 1.2+ HTTP clients with a pinned cipher suite list
//! - **Index fetching**: a single cancellable GET of `index.yaml`
//! - **Index parsing**: lenient decoding, relative URL resolution, version ordering
//! - **Compatibility**: Helm-style platform version range checks
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartsync_repo::{IndexFetcher, RepositoryConfig, SecureClientBuilder, StaticTrustStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = RepositoryConfig::new("stable", "https://charts.example.com/stable");
//! let store = StaticTrustStore::new("openshift-config");
//!
//! let client = SecureClientBuilder::new().build_for(&repo, &store).await?;
//! let charts = IndexFetcher::new(client)
//!     .fetch_charts(&repo, &CancellationToken::new())
//!     .await?;
//!
//! for (name, versions) in &charts {
//!     println!("{}: {} versions", name, versions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod compat;
pub mod config;
pub mod error;
pub mod http;
pub mod index;
pub mod transport;
pub mod trust;

pub use compat::is_compatible_range;
pub use config::{RepositoryConfig, index_url};
pub use error::{RepoError, Result};
pub use http::IndexFetcher;
pub use index::{
    ChartVersions, Dependency, IndexDocument, Maintainer, VersionEntry, parse_index,
    parse_version_lenient, resolve_reference_url, sort_versions,
};
pub use transport::{DEFAULT_FETCH_TIMEOUT, SecureClientBuilder};
pub use trust::{
    ClientIdentity, StaticTrustStore, TrustMaterial, TrustSource, TrustStore, resolve_trust,
};
