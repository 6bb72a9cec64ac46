//! Functional tests against a mocked upstream

#[path = "../support/mod.rs"]
mod support;

mod api_test;
