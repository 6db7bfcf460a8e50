/// Transport-independent search conversation
pub mod flow;
/// Telegram update handlers
pub mod handlers;
/// Channel membership gate
pub mod membership;
/// User state and dialogue management
pub mod state;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use flow::{ChatReplier, ConversationFlow, FlowOptions};
pub use membership::{MembershipGate, MembershipLookup, MemberStatus};
