//! SQL text handling: the safety gate in front of every statement, placeholder resolution
//! against the interaction context, and best-effort table extraction for telemetry.
pub mod guard;
pub mod params;
pub mod tables;

pub use guard::validate;
pub use params::{placeholders, resolve};
pub use tables::referenced_tables;
