#[cfg(test)]
#[macro_use]
mod test_macros;

pub mod config;
pub mod error;
pub mod last_watched;
pub mod middleware;
pub mod models;
pub mod route;
pub mod router;
pub mod simulator;
pub mod status;
pub mod tracing_ext;

mod file_util;
