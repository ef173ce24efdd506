pub mod client;
pub mod error;
pub mod events;
pub mod jwt;
pub mod models;
pub mod signature;

pub use client::GithubApp;
pub use error::GithubError;
