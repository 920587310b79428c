//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - chat turns, owned by the caller as conversation history
//! - model input items, rebuilt by the agent each round (turns, tool calls, tool outputs)
//! - model responses, parsed from the provider wire format
//! - the result envelope, returned to the caller at the end of an interaction
//!
//! Providers convert their wire formats into these structs immediately, so the agent never
//! sees provider-specific JSON.
pub mod envelope;
pub mod message;
pub mod response;
pub mod tool;
