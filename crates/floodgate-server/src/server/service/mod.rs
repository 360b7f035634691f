pub mod handler;
pub mod processor;
pub mod request;
