pub mod api;
pub mod config;
pub mod context;
pub mod executor;
pub mod gateway;
pub mod intent_parser;
pub mod model;
pub mod recorder;
pub mod scheduler;
pub mod wallet;
