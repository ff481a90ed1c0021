#[cfg(test)]
mod consumer_tests;
