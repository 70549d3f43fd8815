pub mod conversation;
pub mod talent;
