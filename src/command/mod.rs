pub mod dispatch;
pub mod keys;
pub mod types;
