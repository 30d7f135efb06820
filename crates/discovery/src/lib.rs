//! Service discovery: descriptors, the registry boundary, and the capability gate.

pub mod descriptor;
pub mod gate;
pub mod registry;

pub use descriptor::{CapabilityDescriptor, ServiceDescriptor};
pub use gate::{CapabilityGate, GateDecision, GateDenial};
pub use registry::{InMemoryServiceRegistry, RegistryError, ServiceRegistry};
