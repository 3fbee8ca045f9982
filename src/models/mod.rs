pub mod cafe;
pub mod invite;
pub mod user;
