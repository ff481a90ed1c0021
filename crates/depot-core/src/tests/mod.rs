// Cross-module test fixtures and integration tests
pub mod integration;
