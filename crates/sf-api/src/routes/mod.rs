pub mod health;
pub mod operations;
pub mod route_servers;
pub mod rules;
pub mod server_routes;
pub mod servers;
