pub mod routes;
pub mod server;

pub use server::{router, start_gateway};
