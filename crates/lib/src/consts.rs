//! Application-wide constants.

/// Directory name used under the platform cache root.
pub const APP_NAME: &str = "nfpm-helper";

/// Package configuration file, read from the build directory.
pub const CONFIG_FILE: &str = "nfpm-helper.yml";

/// Index file mapping package names to subdirectories, read from a repository root.
pub const INDEX_FILE: &str = "nfpm-helper.index.yml";

/// Default generator configuration file.
pub const GENERATE_FILE: &str = "nfpm-helper.gen.yml";

/// Output filename template used when neither the output nor the configuration sets one.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "${NAME}_${VERSION}_${ARCH}";

/// External packaging executable.
pub const PACKAGER_PROGRAM: &str = "nfpm";

/// Prefix for scratch extraction directories.
pub const SCRATCH_PREFIX: &str = "nfpm-helper-";
