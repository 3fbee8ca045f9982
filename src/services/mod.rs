pub mod clock;
pub mod housekeeping;
pub mod invitation_service;
pub mod jwt_service;
pub mod rate_limiter;
pub mod token;
