pub mod errors;

pub type Result<T> = std::result::Result<T, errors::FleetError>;

pub mod client;
pub mod config;
pub mod controller;
pub mod filter;
pub mod mock;
pub mod normalize;
pub mod pagination;
pub mod pipeline;
pub mod snapshot;
pub mod transfer;
pub mod types;
pub mod view;

pub mod prelude {
    pub use super::errors::{ErrorKind, FleetError, ValidationError};
    pub use super::Result;
}
