pub mod config;
pub mod endpoint;
pub mod event;
pub mod meta;
pub mod pod;
pub mod service;
pub mod snapshot;
pub mod validate;
