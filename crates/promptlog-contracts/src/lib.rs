pub mod events;
pub mod models;
pub mod prompts;
pub mod runs;
