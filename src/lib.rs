// Public API for integration tests and alternative front ends

pub mod board;
pub mod console;
pub mod llm;
pub mod narrator;
pub mod protocol;
pub mod state;
pub mod timer;
pub mod types;
