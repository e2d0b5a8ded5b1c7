//! Integration Tests Module
//!
//! End-to-end tests exercising the public crate surface: full polling
//! cycles over scripted portal sessions, state persistence and change
//! notification, and summary aggregation/delivery.

// Shared scripted portal, recognizer and notifier stubs
mod support;

// Full polling cycle tests
mod cycle_test;

// Activity summary aggregation and delivery tests
mod summary_test;
