// ABOUTME: Library exports for the cellpin binary's modules
// ABOUTME: Makes internal modules available to integration tests and benchmarks

pub mod cli;
pub mod cli_output;
pub mod config;
pub mod converter;
pub mod progress;
pub mod sink;
