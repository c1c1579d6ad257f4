#![forbid(unsafe_code)]

pub mod app;
pub mod audit;
pub mod cli;
pub mod cms;
pub mod config;
pub mod dates;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod matcher;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod pool;
pub mod reconcile;
