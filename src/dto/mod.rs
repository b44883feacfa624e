pub mod admin;
pub mod health;
pub mod phase;
pub mod play;
pub mod session;
pub mod sse;
pub mod validation;
pub mod ws;
