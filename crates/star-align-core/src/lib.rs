//! Core types and utilities for star field alignment.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete source detector, image type, or spatial index.

mod logger;
mod similarity;

pub use logger::init_with_level;
pub use similarity::{fit_similarity, FitError, SimilarityTransform};
