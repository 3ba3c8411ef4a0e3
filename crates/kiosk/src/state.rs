//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{AnalysisClient, CatalogClient, build_http_client};
use crate::capture::CaptureWorkflow;
use crate::config::KioskConfig;
use crate::media::BrowserMediaBridge;
use crate::services::CartStore;

/// Capture workflow as wired in the running kiosk.
pub type KioskCapture = CaptureWorkflow<BrowserMediaBridge, AnalysisClient>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The kiosk serves one screen,
/// so the cart and the capture workflow are process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: KioskConfig,
    catalog: CatalogClient,
    cart: CartStore,
    capture: KioskCapture,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared HTTP client cannot be built.
    pub fn new(config: KioskConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.api)?;
        let catalog = CatalogClient::new(client.clone(), &config.api);
        let capture = CaptureWorkflow::new(
            BrowserMediaBridge::new(),
            AnalysisClient::new(client, &config.api),
            config.api.upload_timeout,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                cart: CartStore::new(),
                capture,
            }),
        })
    }

    /// Get a reference to the kiosk configuration.
    #[must_use]
    pub fn config(&self) -> &KioskConfig {
        &self.inner.config
    }

    /// Get a reference to the remote catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the kiosk cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the capture workflow.
    #[must_use]
    pub fn capture(&self) -> &KioskCapture {
        &self.inner.capture
    }

    /// Get a reference to the browser media bridge behind the workflow.
    #[must_use]
    pub fn media(&self) -> &BrowserMediaBridge {
        self.inner.capture.device()
    }
}
