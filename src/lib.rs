pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod retry;
pub mod sampler;
pub mod scratch;
pub mod store;
pub mod util;
pub mod video;
