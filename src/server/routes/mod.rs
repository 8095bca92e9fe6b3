pub mod chat;
pub mod credentials;
pub mod projects;
