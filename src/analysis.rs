pub mod content;
pub mod registry;
