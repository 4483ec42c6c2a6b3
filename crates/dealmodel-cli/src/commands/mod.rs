pub mod discover;
pub mod generate;
pub mod periods;
