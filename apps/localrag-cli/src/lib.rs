use tracing_subscriber::EnvFilter;

/// `RUST_LOG`-driven logging to stderr, `info` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Parse `DOMAIN=WEIGHT`.
pub fn parse_weight(s: &str) -> Result<(String, f32), String> {
    let (domain, weight) = s.split_once('=').ok_or_else(|| format!("expected DOMAIN=WEIGHT, got '{s}'"))?;
    let weight: f32 = weight.trim().parse().map_err(|e| format!("bad weight in '{s}': {e}"))?;
    Ok((domain.trim().to_string(), weight))
}
