// src/constants.rs

/// The name of the primary command file inside a package directory.
pub const PACKAGE_FILENAME: &str = "package.ini";

/// The name of the per-package option state file (mode, grouping, footer).
pub const CONFIG_FILENAME: &str = "config.ini";

/// Commands executed once when the launcher starts.
pub const BOOT_PACKAGE_FILENAME: &str = "boot_package.ini";

/// Commands executed when the launcher exits.
pub const EXIT_PACKAGE_FILENAME: &str = "exit_package.ini";

/// Buffer size for file copies and zip extraction.
pub const COPY_BUFFER_SIZE: usize = 128 * 1024;

/// Chunk size for streaming downloads.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Chunk size for binary pattern scans.
pub const HEX_SCAN_CHUNK_SIZE: usize = 4096;

/// Section-name prefix marking a dropdown/selection option.
pub const SELECTION_PREFIX: char = '*';

/// Section-name prefix marking a page break, never executable.
pub const PAGE_MARKER_PREFIX: char = '@';

/// Root folders that `delete`/`move` refuse to touch directly.
pub const PROTECTED_FOLDERS: &[&str] = &[
    "/Nintendo/",
    "/emuMMC/",
    "/atmosphere/",
    "/bootloader/",
    "/switch/",
    "/config/",
    "/",
];
