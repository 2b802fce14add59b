pub mod command;
pub mod config;
pub mod error;
pub mod file;
pub mod header;
pub mod offsets;
pub mod patch;
pub mod strip;

pub use config::{PatchConfig, RegisterRanges, VersionPolicy};
pub use error::VgmError;
pub use file::patch_file;
pub use header::{Version, VgmHeader};
pub use patch::{patch, PatchOutput, PatchReport};
