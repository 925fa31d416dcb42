//! Version resolution against the upstream manifest.
//!
//! Maps a symbolic request (`"latest"`, `"1.21.4"`) to a concrete,
//! digest-addressed client archive.

pub mod manifest;
pub mod resolver;

pub use manifest::{is_alias, VersionKind, VersionManifest};
pub use resolver::{closest_version, ResolvedVersion, VersionResolver};
