// Linux-specific helpers: /proc fallbacks for facts sysinfo leaves blank.

/// Read first "model name" from /proc/cpuinfo (Linux). Used when sysinfo reports no brand,
/// which happens on some ARM boards.
pub(super) fn read_cpu_model_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        parse_cpu_model(&content)
    }
    #[cfg(not(target_os = "linux"))]
    None
}

#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name") || line.starts_with("Model"))
        .find_map(|line| {
            let (_, value) = line.split_once(':')?;
            let value = value.trim();
            (!value.is_empty() && value != "cpu0").then(|| value.to_string())
        })
}
