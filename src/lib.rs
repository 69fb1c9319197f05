// Library for tests to access modules

pub mod cadence;
pub mod config;
pub mod error;
pub mod fleet;
pub mod inventory_repo;
pub mod models;
pub mod persist;
pub mod reconciler;
pub mod routes;
pub mod scheduler;
pub mod tasks;
pub mod transport;
pub mod vendor;
pub mod version;
