pub mod lifecycle;
pub mod player;
