use std::path::PathBuf;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DATA: &str = "database/trackers.bin.gz";
pub const DEFAULT_STATIC: &str = "static";

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub addr: String,
    /// Snapshot file for the store; `None` keeps everything in memory.
    pub data: Option<PathBuf>,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_ADDR.to_string(),
            data: Some(PathBuf::from(DEFAULT_DATA)),
            static_dir: PathBuf::from(DEFAULT_STATIC),
        }
    }
}

impl Config {
    /// Read `PIXELS_ADDR`, `PIXELS_DATA` and `PIXELS_STATIC`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        let addr = lookup("PIXELS_ADDR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.addr);

        // Set but empty means "do not persist".
        let data = match lookup("PIXELS_DATA") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => defaults.data,
        };

        let static_dir = lookup("PIXELS_STATIC")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        Config {
            addr,
            data,
            static_dir,
        }
    }

    /// Apply command line overrides: the first argument is the bind address.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(addr) = args.into_iter().next().filter(|a| !a.trim().is_empty()) {
            self.addr = addr;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn reads_variables() {
        let config = Config::from_lookup(lookup(&[
            ("PIXELS_ADDR", "0.0.0.0:8080"),
            ("PIXELS_DATA", "/tmp/p.bin.gz"),
            ("PIXELS_STATIC", "public"),
        ]));
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.data, Some(PathBuf::from("/tmp/p.bin.gz")));
        assert_eq!(config.static_dir, PathBuf::from("public"));
    }

    #[test]
    fn empty_data_means_memory_only() {
        let config = Config::from_lookup(lookup(&[("PIXELS_DATA", "")]));
        assert_eq!(config.data, None);
    }

    #[test]
    fn argument_overrides_address() {
        let config = Config::default().with_args(vec!["[::1]:4000".to_string()]);
        assert_eq!(config.addr, "[::1]:4000");

        let config = Config::default().with_args(Vec::new());
        assert_eq!(config.addr, DEFAULT_ADDR);
    }
}
