pub mod app;
pub mod authority;
pub mod config;
pub mod domain;
pub mod error;
pub mod hgnc;
pub mod ingest;
pub mod output;
pub mod pair;
pub mod record;
pub mod reduce;
pub mod store;
pub mod summary;
