//! End-to-end tests for driver-build against scratch kernel trees.
//!
//! The fake build tool is a POSIX shell script, so these only run on unix.

#![cfg(unix)]

mod build_tests;
mod clean_tests;
mod common;
