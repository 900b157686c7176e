pub(crate) const DEFAULT_URL: &str = "http://localhost:8080/";
pub(crate) const DEFAULT_DURATION: &str = "30s";
pub(crate) const DEFAULT_TIMEOUT: &str = "5s";
pub(crate) const DEFAULT_DNS_TTL: &str = "5m";
pub(crate) const DEFAULT_STATS_FILE: &str = "stats.csv";
