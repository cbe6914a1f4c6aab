//! Location consent prompt, shown once per client.
//!
//! [`ConsentStore`] persists whether the prompt has ever been shown (not the
//! answer). [`ConsentFlow`] decides at startup whether to show it and exposes
//! the `on_defer` / `on_allow` pair the UI wires to the popup.

use crate::resolver::GeoResolver;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConsentRecord {
    #[serde(default)]
    pub geo_prompt_seen: bool,
}

/// Toml file holding the [`ConsentRecord`].
#[derive(Debug, Clone)]
pub struct ConsentStore {
    path: PathBuf,
}

impl ConsentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the record. A missing or unreadable file counts as "never prompted".
    pub fn load(&self) -> ConsentRecord {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return ConsentRecord::default();
        };
        match toml::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Failed to parse {}: {}. Treating prompt as never shown.",
                    self.path.display(),
                    e
                );
                ConsentRecord::default()
            }
        }
    }

    pub fn prompt_seen(&self) -> bool {
        self.load().geo_prompt_seen
    }

    pub fn mark_prompt_seen(&self) -> Result<()> {
        let record = ConsentRecord {
            geo_prompt_seen: true,
        };
        fs::write(&self.path, toml::to_string_pretty(&record)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    NeverPrompted,
    /// Popup shown, waiting for the user.
    Prompted,
    Resolved,
}

/// What the caller should do after a flow transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentStep {
    /// Show the popup and hold off rendering.
    AwaitChoice,
    /// Render the log list now.
    Render,
    /// The call did not apply to the current state.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentChoice {
    Later,
    Allow,
}

pub struct ConsentFlow {
    store: ConsentStore,
    state: ConsentState,
}

impl ConsentFlow {
    pub fn new(store: ConsentStore) -> Self {
        Self {
            store,
            state: ConsentState::NeverPrompted,
        }
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ConsentState::Resolved
    }

    /// Runs the startup decision.
    ///
    /// Prompts when the popup was never shown and a device locator exists.
    /// Otherwise tries precise location silently and asks for a render.
    pub async fn start(&mut self, resolver: &mut GeoResolver) -> ConsentStep {
        if self.state != ConsentState::NeverPrompted {
            return ConsentStep::Ignored;
        }

        if !self.store.prompt_seen() && resolver.has_device_location() {
            info!("Location prompt never shown; asking for consent");
            self.state = ConsentState::Prompted;
            return ConsentStep::AwaitChoice;
        }

        debug!("Skipping location prompt; trying precise location silently");
        resolver.acquire_precise_location().await;
        self.state = ConsentState::Resolved;
        ConsentStep::Render
    }

    /// "Later": nothing is persisted, so the prompt returns next run.
    pub fn on_defer(&mut self, resolver: &mut GeoResolver) -> ConsentStep {
        if self.state != ConsentState::Prompted {
            return ConsentStep::Ignored;
        }
        info!("Location prompt deferred; using IP geolocation for this session");
        resolver.decline_precise_location();
        self.state = ConsentState::Resolved;
        ConsentStep::Render
    }

    /// "Allow": records the prompt as shown, then tries precise location.
    pub async fn on_allow(&mut self, resolver: &mut GeoResolver) -> ConsentStep {
        if self.state != ConsentState::Prompted {
            return ConsentStep::Ignored;
        }
        if let Err(e) = self.store.mark_prompt_seen() {
            warn!("Could not persist location prompt state: {}", e);
        }
        let label = resolver.acquire_precise_location().await;
        info!("Location allowed; precise label: {:?}", label);
        self.state = ConsentState::Resolved;
        ConsentStep::Render
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::ReverseGeocoder;
    use crate::location::IpGeolocator;
    use crate::precise::tests::{lyon_geocoder, CountingLocator};
    use crate::precise::{DeviceLocator, PreciseLocation};
    use reqwest::Client;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::MockServer;

    fn resolver_with(uri: &str, locator: Option<Arc<dyn DeviceLocator>>) -> GeoResolver {
        let client = Client::new();
        GeoResolver::new(
            ReverseGeocoder::new(client.clone(), uri, "fr"),
            IpGeolocator::new(client, uri),
            PreciseLocation::new(locator, true),
        )
    }

    fn store_in(dir: &TempDir) -> ConsentStore {
        ConsentStore::new(dir.path().join("state.toml"))
    }

    #[tokio::test]
    async fn first_run_prompts_before_rendering() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        let locator = CountingLocator::succeeding(45.76, 4.83);
        let mut resolver = resolver_with(&server.uri(), Some(locator.clone()));
        let mut flow = ConsentFlow::new(store_in(&dir));

        assert_eq!(flow.start(&mut resolver).await, ConsentStep::AwaitChoice);
        assert_eq!(flow.state(), ConsentState::Prompted);
        assert_eq!(locator.call_count(), 0);
    }

    #[tokio::test]
    async fn later_does_not_persist_and_prompts_again() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        let locator = CountingLocator::succeeding(45.76, 4.83);

        let mut resolver = resolver_with(&server.uri(), Some(locator.clone()));
        let mut flow = ConsentFlow::new(store_in(&dir));
        flow.start(&mut resolver).await;
        assert_eq!(flow.on_defer(&mut resolver), ConsentStep::Render);
        assert!(flow.is_resolved());
        assert!(!store_in(&dir).prompt_seen());

        // No device request for the rest of this run.
        resolver.best_geo_label(None).await;
        assert_eq!(locator.call_count(), 0);

        // Next run.
        let mut resolver = resolver_with(&server.uri(), Some(locator.clone()));
        let mut flow = ConsentFlow::new(store_in(&dir));
        assert_eq!(flow.start(&mut resolver).await, ConsentStep::AwaitChoice);
    }

    #[tokio::test]
    async fn allow_persists_and_acquires() {
        let dir = TempDir::new().unwrap();
        let (server, _) = lyon_geocoder().await;
        let locator = CountingLocator::succeeding(45.76, 4.83);

        let mut resolver = resolver_with(&server.uri(), Some(locator.clone()));
        let mut flow = ConsentFlow::new(store_in(&dir));
        flow.start(&mut resolver).await;
        assert_eq!(flow.on_allow(&mut resolver).await, ConsentStep::Render);
        assert!(store_in(&dir).prompt_seen());
        assert_eq!(
            resolver.precise_state().label.as_ref().map(|l| l.as_str()),
            Some("Lyon, France")
        );

        // Next run goes straight to a silent attempt.
        let mut resolver = resolver_with(&server.uri(), Some(locator.clone()));
        let mut flow = ConsentFlow::new(store_in(&dir));
        assert_eq!(flow.start(&mut resolver).await, ConsentStep::Render);
        assert_eq!(locator.call_count(), 2);
    }

    #[tokio::test]
    async fn no_capability_skips_prompt() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        let mut resolver = resolver_with(&server.uri(), None);
        let mut flow = ConsentFlow::new(store_in(&dir));

        assert_eq!(flow.start(&mut resolver).await, ConsentStep::Render);
        assert!(resolver.precise_state().tried);
    }

    #[tokio::test]
    async fn callbacks_outside_prompt_are_ignored() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        let mut resolver = resolver_with(&server.uri(), None);
        let mut flow = ConsentFlow::new(store_in(&dir));

        assert_eq!(flow.on_defer(&mut resolver), ConsentStep::Ignored);
        flow.start(&mut resolver).await;
        assert_eq!(flow.on_allow(&mut resolver).await, ConsentStep::Ignored);
        assert_eq!(flow.start(&mut resolver).await, ConsentStep::Ignored);
        assert!(!store_in(&dir).prompt_seen());
    }

    #[test]
    fn corrupt_state_file_counts_as_never_prompted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("state.toml"), "geo_prompt_seen = [").unwrap();
        assert!(!store.prompt_seen());
        store.mark_prompt_seen().unwrap();
        assert!(store.prompt_seen());
    }
}
