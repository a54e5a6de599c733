//! Chart model: static figure layout and the live series it plots.

pub mod registry;
pub mod series;
