pub mod notification;
pub mod request;
pub mod user;
