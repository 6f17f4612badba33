// src/fs/mod.rs

use std::fmt::Debug;
use std::path::Path;

pub mod mock;

/// The filesystem queries the step machinery needs.
///
/// Discovery checks that the build file exists before spawning the
/// toolchain, and the launch orchestrator locates compiled test binaries.
pub trait FileSystem: Send + Sync + Debug {
    fn is_file(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}
