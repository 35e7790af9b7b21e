pub mod http_error;
pub mod tasks;
