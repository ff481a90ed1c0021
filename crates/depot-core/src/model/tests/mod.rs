#[cfg(test)]
mod platform_tests;
