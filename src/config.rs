use std::path::PathBuf;
use std::time::Duration;

use crate::cli::StorageArgs;
use crate::types::StorageKind;

/// Storage settings after validation and normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storage_kind: StorageKind,
    pub data_dir: PathBuf,
    pub save_interval: Duration,
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(args: &StorageArgs) -> anyhow::Result<Self> {
        let data_path = args.data_path.trim();
        if data_path.is_empty() {
            anyhow::bail!("Data path must not be empty");
        }

        Ok(Self {
            storage_kind: args.storage_type,
            data_dir: expand_tilde(data_path),
            save_interval: parse_interval(&args.save_interval)?,
        })
    }
}

/// Parse a duration such as `"250ms"`, `"30s"`, `"5m"`, `"1h"` or a bare
/// number of seconds (`"45"`).
pub(crate) fn parse_interval(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    if let Ok(value) = digits.parse::<u64>() {
        let duration = match unit {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => None,
        };
        if let Some(duration) = duration {
            return Ok(duration);
        }
    }

    anyhow::bail!(
        "Cannot parse '{}' as an interval. Expected a number with an optional \
         unit suffix (500ms, 30s, 5m, 1h)",
        s
    )
}
