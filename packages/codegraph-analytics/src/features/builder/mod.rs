//! Graph builder: parse-result ingestion in ordered phases

mod builder;
mod edges;
mod interfaces;
mod options;
mod signatures;

pub use builder::GraphBuilder;
pub use options::{
    BuildOptions, BuildPhase, BuildResult, BuildStats, EdgeError, FileError, ProgressFn,
};
pub use signatures::parse_method_signature;
