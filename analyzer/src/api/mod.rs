pub mod models;
mod routes;

pub use routes::routes;
