//! Vision provider implementations for vitalbot.
//!
//! All providers implement the `vitalbot_core::VisionProvider` trait.
//! [`build_from_config`] picks one based on configuration.

pub mod dashscope;
pub mod openai_compat;
pub mod router;

pub use dashscope::DashScopeProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
