pub mod error;
pub mod listener;
pub mod orchestrator;
pub mod reader;
pub mod retry;
pub mod state_manager;
pub mod transform;
pub mod writer;
