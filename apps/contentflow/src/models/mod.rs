pub mod content;
pub mod request;
pub mod user;
