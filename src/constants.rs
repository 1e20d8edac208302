// src/constants.rs

/// Environment variable overriding the snapshot base directory.
pub const STATE_DIR_ENV: &str = "DISCOVERY_CURB_STATE_DIR";

// Default state dir is `%ProgramData%\DiscoveryCurb\snapshots`.
pub const STATE_DIR_BASE_ENV: &str = "ProgramData";
pub const STATE_DIR_FALLBACK_BASE: &str = "C:\\ProgramData";
pub const STATE_DIR_APP: &str = "DiscoveryCurb";
pub const STATE_DIR_LEAF: &str = "snapshots";

/// The service that must keep working.
pub const PRIMARY_SERVICE: &str = "GamingServices";
/// The network helper that runs the background library scan.
pub const HELPER_SERVICE: &str = "GamingServicesNet";

/// Telemetry and companion services touched only with `--deep-clean`.
pub const EXTENDED_SERVICES: &[&str] = &[
    "XblAuthManager",
    "XboxNetApiSvc",
    "XblGameSave",
    "DiagTrack",
    "dmwappushservice",
];

pub const DISCOVERY_FLAGS: &[&str] = &[
    "EnableGameDiscovery",
    "EnableLibraryScan",
    "EnableNetworkDiscovery",
];

pub const FLAG_LOCATIONS: &[&str] = &[
    "HKEY_LOCAL_MACHINE\\SOFTWARE\\Policies\\Microsoft\\GamingServices",
    "HKEY_CURRENT_USER\\Software\\Microsoft\\GamingServices\\Discovery",
];

/// `(name pattern, path pattern)` pairs.
pub const TASK_PATTERNS: &[(&str, &str)] = &[
    ("*Discovery*", "\\Microsoft\\GamingServices\\*"),
    ("*LibraryScan*", "\\Microsoft\\XblGameSave\\*"),
    ("XblGameSaveTask*", "\\Microsoft\\XblGameSave\\*"),
];

pub const CACHE_DIR_BASE_ENV: &str = "LOCALAPPDATA";
pub const CACHE_DIR_RELATIVE: &str =
    "Packages\\Microsoft.GamingServices_8wekyb3d8bbwe\\LocalCache";

pub const CACHE_PATTERNS: &[&str] = &["*.discovery", "GameDiscovery*.json", "LibraryScan*.cache"];
