//! drvbuild-lib: driver selection and build orchestration
//!
//! This crate decides which optional kernel drivers take part in a build and
//! drives their build:
//! - `registry`: discovers candidate drivers and their configuration keys
//! - `config` / `resolve`: turn the flat kernel configuration into a selection
//! - `descriptor`: writes (or removes) the combined descriptor for built-in drivers
//! - `dispatch`: runs the sub-builds of module drivers in a bounded worker pool
//! - `orchestrate`: ties the pieces together for a single `build` or `clean` run

pub mod action;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod orchestrate;
pub mod registry;
pub mod resolve;
