//! The four role-specific behaviors. Planning, backend, and frontend return
//! canned structured output; shipping forwards to the carrier client.

mod backend;
mod frontend;
mod planning;
mod shipping;

pub use backend::BackendWorker;
pub use frontend::FrontendWorker;
pub use planning::PlanningWorker;
pub use shipping::ShippingWorker;
