// Library modules for bandcover
// This allows tests to access internal modules

pub mod config;
pub mod error;
pub mod images;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
pub mod test_utils;
