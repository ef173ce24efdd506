pub mod models;
pub mod session;

pub use models::ClerkEvent;
pub use session::ClerkSessionVerifier;
