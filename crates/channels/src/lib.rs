//! Chat platform clients for vitalbot.
//!
//! Available platforms:
//! - **DingTalk**: robot replies, attachment download, callback signatures

pub mod dingtalk;

pub use dingtalk::{DingTalkClient, verify_callback_signature};
