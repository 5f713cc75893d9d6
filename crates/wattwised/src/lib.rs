//! Wattwised library - calculator form server, exposed for route tests

pub mod form;
pub mod page;
pub mod routes;
pub mod server;
