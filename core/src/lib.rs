// Courier Core Library
// Multi-worker team runtime: message bus, orchestrator, workers

pub mod carrier;
pub mod messaging;
pub mod orchestrator;
pub mod worker;

// Export core types
pub use messaging::{
    BusEvent, BusStats, Envelope, EnvelopeStatus, Kind, MessageBus, Payload, Priority, Role,
    TaskPayload,
};
pub use orchestrator::{ConversationSummary, Orchestrator, Plan, PlannedTask};
pub use worker::{capabilities, Worker, WorkerBehavior, WorkerInfo, WorkerStatus};

use std::sync::Arc;

use tracing::info;

use carrier::CarrierApi;
use worker::roles::{BackendWorker, FrontendWorker, PlanningWorker, ShippingWorker};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Bus error: {0}")]
    BusError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Orchestrator error: {0}")]
    OrchestratorError(String),

    #[error("Carrier error: {0}")]
    CarrierError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, CourierError>;

/// Core runtime: one bus, one orchestrator, four role workers.
///
/// `Team` owns the wiring that the front end drives: construct it with a
/// carrier client, `start` it to bring the workers online, and `shutdown`
/// to stop them and report whatever the bus still holds.
pub struct Team {
    pub bus: Arc<MessageBus>,
    pub orchestrator: Arc<Orchestrator>,
    carrier: Arc<dyn CarrierApi>,
    workers: Vec<Worker>,
    orchestrator_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Team {
    pub fn new(carrier: Arc<dyn CarrierApi>) -> Self {
        let bus = Arc::new(MessageBus::new());
        let orchestrator = Orchestrator::new(Arc::clone(&bus));
        Self {
            bus,
            orchestrator,
            carrier,
            workers: Vec::new(),
            orchestrator_handle: None,
        }
    }

    /// Subscribe the orchestrator and spawn the four role workers.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Courier team...");

        self.orchestrator_handle = Some(Arc::clone(&self.orchestrator).start());

        self.workers
            .push(Worker::spawn(Arc::clone(&self.bus), Box::new(PlanningWorker::new())));
        self.workers
            .push(Worker::spawn(Arc::clone(&self.bus), Box::new(BackendWorker::new())));
        self.workers
            .push(Worker::spawn(Arc::clone(&self.bus), Box::new(FrontendWorker::new())));
        self.workers.push(Worker::spawn(
            Arc::clone(&self.bus),
            Box::new(ShippingWorker::new(Arc::clone(&self.carrier))),
        ));

        info!("Courier team started: {} workers online", self.workers.len());
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down Courier team...");

        for worker in self.workers.drain(..) {
            worker.stop(&self.bus);
        }
        if let Some(handle) = self.orchestrator_handle.take() {
            handle.abort();
        }
        self.bus.shutdown();

        info!("Courier team shut down");
        Ok(())
    }

    /// Snapshot of every worker for the `status` command.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.workers.iter().map(Worker::info).collect()
    }
}
