pub mod layout;
pub mod source;
