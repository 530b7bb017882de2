#![cfg(test)]

pub mod common;
pub mod driver_tests;
pub mod inventory_flow_tests;
pub mod scenario_tests;
