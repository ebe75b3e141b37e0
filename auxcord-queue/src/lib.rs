mod cache;
mod models;
mod service;
mod store;

pub use cache::*;
pub use models::*;
pub use service::*;
pub use store::*;
