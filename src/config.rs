use std::path::PathBuf;
use std::thread;
use chrono::Duration;
use clap::Parser;

use crate::ledger::DEFAULT_UNDO_TTL_SECS;

/// Longest accepted undo window (one day).
pub const MAX_UNDO_TTL_SECS: i64 = 86_400;

/// Server flags. Each one can also come from the environment.
#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Document classification record store", long_about = None)]
pub struct Config {
    #[clap(long, env = "CLASSIDB_ADDR", default_value = "127.0.0.1:3001")]
    pub addr: String,

    /// JSON array of {document_name, classifications} loaded at startup
    #[clap(long, env = "CLASSIDB_SEED", default_value = "data/classifications.json")]
    pub seed: PathBuf,

    #[clap(
        long,
        env = "CLASSIDB_UNDO_TTL_SECS",
        default_value_t = DEFAULT_UNDO_TTL_SECS,
        value_parser = clap::value_parser!(i64).range(0..=MAX_UNDO_TTL_SECS)
    )]
    pub undo_ttl_secs: i64,
}

impl Config {
    pub fn undo_ttl(&self) -> Duration {
        Duration::seconds(self.undo_ttl_secs.clamp(0, MAX_UNDO_TTL_SECS))
    }
}

/// Tokio sizing derived from the host.
#[derive(Debug, Clone)]
pub struct RuntimeProfile {
    pub logical_cores: usize,
    pub worker_threads: usize,
}

impl RuntimeProfile {
    pub fn detect() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::for_cores(cores)
    }

    pub fn for_cores(cores: usize) -> Self {
        // Single core: one worker for requests plus one for blocking I/O
        let worker_threads = if cores <= 1 { 2 } else { cores.min(8) };
        Self { logical_cores: cores, worker_threads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let config = Config::parse_from(["classidb"]);
        assert_eq!(config.addr, "127.0.0.1:3001");
        assert_eq!(config.undo_ttl(), Duration::seconds(30));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from(["classidb", "--addr", "0.0.0.0:8080", "--seed", "/tmp/s.json", "--undo-ttl-secs", "5"]);
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.seed, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.undo_ttl(), Duration::seconds(5));
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        for bad in ["9223372036854775807", "86401", "-1", "soon"] {
            let parsed = Config::try_parse_from(["classidb", "--undo-ttl-secs", bad]);
            assert!(parsed.is_err(), "accepted --undo-ttl-secs {bad}");
        }

        let config = Config::parse_from(["classidb", "--undo-ttl-secs", "86400"]);
        assert_eq!(config.undo_ttl(), Duration::seconds(MAX_UNDO_TTL_SECS));
    }

    #[test]
    fn undo_ttl_never_panics_on_direct_construction() {
        let config = Config {
            addr: "127.0.0.1:0".into(),
            seed: PathBuf::from("seed.json"),
            undo_ttl_secs: i64::MAX,
        };
        assert_eq!(config.undo_ttl(), Duration::seconds(MAX_UNDO_TTL_SECS));
    }

    #[test]
    fn worker_threads_scale_with_cores() {
        assert_eq!(RuntimeProfile::for_cores(1).worker_threads, 2);
        assert_eq!(RuntimeProfile::for_cores(4).worker_threads, 4);
        assert_eq!(RuntimeProfile::for_cores(64).worker_threads, 8);
    }
}
