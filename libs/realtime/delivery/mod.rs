//! # Delivery
//!
//! Transport selection and subscriber fan-out. The [`DeliveryOrchestrator`]
//! owns at most one transport at a time and routes every notification it
//! produces through the [`HandlerRegistry`].

pub mod orchestrator;
pub mod registry;

pub use orchestrator::{ConnectionMode, DeliveryOrchestrator, DeliveryState, Diagnostics};
pub use registry::{DispatchReport, HandlerRegistry, Subscriber, Unsubscribe};
