pub mod generate;
pub mod repo;
pub mod sweep;
