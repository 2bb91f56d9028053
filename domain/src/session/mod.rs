//! Conversation session domain.
//!
//! - [`token::ConversationToken`]: opaque identifier reported by the agent
//! - [`token::TokenFormat`]: the `<scheme><hex body>` shape checked before sending
//! - [`handle::ConversationHandle`]: one conversation per (instance, role)

pub mod handle;
pub mod token;
