//! Leiden community detection, sequential and parallel

mod leiden;
mod parallel;

pub use leiden::{
    cross_package_communities, detect_communities, Community, LeidenOptions, LeidenResult,
};
pub use parallel::detect_communities_parallel;
