//! Integration tests for Rental-Harvest
//!
//! These tests use wiremock to stand in for the geocoding and listings
//! services and exercise harvests end-to-end, including interruption and
//! resume, without waiting on real pauses.

mod common;
mod harvest_tests;
mod store_tests;
