use sf_common::config::EnvConfig;
use sf_fleet::config_writer::ConfigWriter;
use sf_fleet::model::{Route, RouteServerAssignment, Server};
use sf_fleet::ssh::CommandExecutor;
use sf_fleet::store::JsonStore;
use std::sync::Arc;

/// Shared application state for all API routes.
#[derive(Clone)]
pub struct ApiState {
    pub env: Arc<EnvConfig>,
    pub servers: JsonStore<Server>,
    pub assignments: JsonStore<RouteServerAssignment>,
    /// Routes pushed to individual servers
    pub routes: JsonStore<Route>,
    pub executor: Arc<dyn CommandExecutor>,
    pub config_writer: ConfigWriter,
}

impl ApiState {
    /// Wire stores and the config writer from `env` around one executor.
    pub fn new(env: Arc<EnvConfig>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            servers: JsonStore::new(env.servers_file()),
            assignments: JsonStore::new(env.assignments_file()),
            routes: JsonStore::new(env.routes_file()),
            config_writer: ConfigWriter::new(executor.clone(), env.reload_command.clone()),
            executor,
            env,
        }
    }
}
