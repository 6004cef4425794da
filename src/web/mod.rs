pub mod bearer;
pub mod extract;
pub mod handlers;
