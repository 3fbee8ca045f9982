pub mod error;
pub mod invitation_handlers;
