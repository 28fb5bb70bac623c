pub mod artifacts;
pub mod conversation;
pub mod timestamp;
