pub(super) const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub(super) const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;

#[cfg(target_os = "windows")]
pub(super) const WATCH_CONFIG_CANDIDATES: [&str; 3] = [
    r"C:\ProgramData\ThreadWatch\threadwatch.toml",
    r".\conf\threadwatch.toml",
    r".\threadwatch.toml",
];

#[cfg(not(target_os = "windows"))]
pub(super) const WATCH_CONFIG_CANDIDATES: [&str; 2] =
    ["./conf/threadwatch.toml", "./threadwatch.toml"];
