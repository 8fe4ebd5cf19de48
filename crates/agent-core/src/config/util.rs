use super::types::OutputFormat;

pub(super) fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

pub(super) fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| non_empty(Some(v)))
}

pub(super) fn env_u64(name: &str) -> Option<u64> {
    env_non_empty(name).and_then(|v| v.trim().parse::<u64>().ok())
}

pub(super) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "enabled" | "on"
    )
}

pub(super) fn parse_output(raw: &str) -> Option<OutputFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" | "plain" => Some(OutputFormat::Text),
        "json" => Some(OutputFormat::Json),
        _ => None,
    }
}
