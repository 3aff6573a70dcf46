pub mod agent;
pub mod error;
pub mod mailbox;

pub use agent::{RoomAgent, RoomAgentHandle};
pub use error::AgentError;
