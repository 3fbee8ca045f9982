pub mod cafe_repository;
pub mod invitation_repository;
pub mod memory_repository;
