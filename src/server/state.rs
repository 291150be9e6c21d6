//! Application state for the X-ray server
//!
//! Holds the loaded classifier, the report generator and every live session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::inference::{Classifier, Preprocessor};
use crate::report::{ReportGenerator, DEFAULT_ATTRIBUTION};
use crate::session::SessionContext;
use crate::utils::error::{Result, XrayError};

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Trained model path, with or without the `.mpk` extension
    pub model_path: PathBuf,
    /// Root directory for generated reports; each session gets a subdirectory
    pub reports_dir: PathBuf,
    /// Attribution line printed on every report
    pub attribution: String,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: PathBuf::from("output/models/covid_model"),
            reports_dir: PathBuf::from("reports"),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| XrayError::Config(format!("invalid listen address: {}", e)))
    }
}

/// One session behind its own lock; the map lock is only held for lookups
pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub classifier: Arc<dyn Classifier>,
    pub reports: ReportGenerator,
    pub sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, classifier: Arc<dyn Classifier>) -> Self {
        let reports = ReportGenerator::new(&config.reports_dir)
            .with_attribution(config.attribution.clone());

        Self {
            config,
            classifier,
            reports,
            sessions: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }

    /// A fresh session sized for the loaded model
    pub fn new_session(&self) -> SessionContext {
        let size = self.classifier.input_size() as u32;
        SessionContext::new(Preprocessor::with_image_size(size))
    }

    /// Handle of a live session
    pub async fn session(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Report generator writing into the session's own directory
    pub fn session_reports(&self, id: &Uuid) -> ReportGenerator {
        self.reports.subdirectory(&id.to_string())
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
