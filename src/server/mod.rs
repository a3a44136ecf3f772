pub mod builder;
pub mod handler;
pub mod listener;
mod observability;

pub use builder::ServerBuilder;
pub use handler::ObservabilityHandler;
pub use observability::ObservabilityService;
