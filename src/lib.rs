pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod store;
pub mod service;
pub mod api;

pub use config::Config;
pub use error::{DetectiveError, Result};
pub use graph::{Relationship, RelationshipType, TypeFilter, traverse_graph};
pub use service::PersonService;
