//! Run command - watch repositories and keep their chart records in sync

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::SyncArgs;
use crate::error::{CliError, Result};

/// Run the controller until the token is cancelled
pub async fn run(args: &SyncArgs, resync_interval: Duration, cancel: CancellationToken) -> Result<()> {
    let settings = args.settings(resync_interval);

    let client = kube::Client::try_default().await.map_err(CliError::cluster)?;

    chartsync_kube::controller::run(client, settings, cancel).await?;
    Ok(())
}
