//! Core domain vocabulary: paths, node kinds, users and the property model.

pub mod paths;
pub mod props;
pub mod types;
