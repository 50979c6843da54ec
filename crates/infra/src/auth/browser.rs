//! Opens the authorization URL in the user's default browser.

use meshport_core::BrowserLauncher;
use meshport_domain::{MeshportError, Result};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        webbrowser::open(url).map_err(|err| {
            warn!(error = %err, "Failed to launch system browser");
            MeshportError::Internal(format!("failed to open browser: {err}"))
        })?;
        info!("Opened authorization page in system browser");
        Ok(())
    }
}
