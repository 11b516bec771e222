pub mod classify;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod gateway;
pub mod gray;
pub mod orchestrator;
pub mod sequencer;
pub mod store;

#[cfg(test)]
mod tests;

pub use gateway::Gateway;
