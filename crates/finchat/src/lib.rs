pub mod agent;
pub mod context;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod sql;
pub mod telemetry;
pub mod tools;
