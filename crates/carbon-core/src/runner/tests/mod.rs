#[cfg(test)]
mod outcome_tests;
