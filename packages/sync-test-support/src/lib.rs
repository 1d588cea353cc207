//! Test support for the game sync workspace.
//!
//! Integration tests install logging through [`logging::init`], usually from a
//! `ctor` hook in their `common` module.

pub mod logging;
