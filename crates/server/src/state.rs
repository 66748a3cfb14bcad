use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use admission::{AdmissionController, VisitCounter};
use eventlog::EventLog;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pathstore::{PathStore, RepositoryConfig};
use recognition::RecognitionGateway;
use std::sync::Arc;

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Selector path history (write-through to `path_db_file`)
    pub paths: PathStore,

    /// Per-client, per-route request quotas
    pub admission: AdmissionController,

    /// Status page visit tally
    pub visits: VisitCounter,

    /// Recognition audit log
    pub events: EventLog,

    /// Text classifier and gap locator
    pub gateway: RecognitionGateway,

    /// Prometheus exporter, present when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state
    ///
    /// Fails when the persisted path history is corrupt or the classifier
    /// configuration is inconsistent; an unconfigured classifier is allowed.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let paths = PathStore::open(RepositoryConfig::json_file(&config.path_db_file).build())?;

        let classifier = config
            .classifier
            .build_with_deadline(config.recognition_timeout())
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let gateway = RecognitionGateway::with_classifier(classifier);

        let metrics = if config.metrics_enabled {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| ServerError::Config(format!("metrics recorder: {e}")))?;
            Some(handle)
        } else {
            None
        };

        let mut state = Self::with_parts(config, paths, gateway);
        state.metrics = metrics;
        Ok(state)
    }

    /// Assemble state from already-built collaborators. No metrics recorder
    /// is installed.
    pub fn with_parts(config: ServerConfig, paths: PathStore, gateway: RecognitionGateway) -> Self {
        let admission = AdmissionController::new(config.quota_policy(), config.max_tracked_clients);
        let events = EventLog::new(&config.log_dir);

        Self {
            config: Arc::new(config),
            paths,
            admission,
            visits: VisitCounter::new(),
            events,
            gateway,
            metrics: None,
        }
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("paths", &self.paths.describe())
            .field("gateway", &self.gateway)
            .field("events", &self.events.dir())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
