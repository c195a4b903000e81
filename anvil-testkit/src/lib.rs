//! Test helpers for Anvil crafting tests.
//!
//! Provides a seeded in-memory forge: one user, a small item catalog,
//! combine and decompose recipes, and inventory shortcuts.

mod helpers;

pub use helpers::{catalog, Forge};

pub use anyhow::Result;
