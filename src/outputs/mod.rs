//! Output generation.
//!
//! - [`json`]: writes a [`SearchReport`](crate::models::SearchReport) for
//!   API consumption

pub mod json;
