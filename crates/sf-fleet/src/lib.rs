pub mod config_writer;
pub mod health;
pub mod model;
pub mod restart;
pub mod rules;
pub mod servers;
pub mod ssh;
pub mod store;
pub mod topology;
pub mod validation;
