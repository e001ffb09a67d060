//! # Prompt Template Modules
//!
//! This module organizes the prompt templates used by the `trialsage` library.

pub mod extraction;
