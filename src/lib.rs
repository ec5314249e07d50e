pub mod api;
pub mod bus;
pub mod error;
pub mod k8s;
pub mod service;

pub use error::{BusError, Error, Result};
pub use service::{Service, ServiceConfig};
