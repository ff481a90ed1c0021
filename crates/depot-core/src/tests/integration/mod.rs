#![cfg(test)]

pub mod common;
mod pipeline_tests;
