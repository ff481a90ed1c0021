// Storage test module
#[cfg(test)]
mod local_tests;
