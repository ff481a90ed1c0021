#[cfg(test)]
mod history_tests;
