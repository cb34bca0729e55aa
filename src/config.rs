use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Firebase,
    Postgres,
    None,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(SinkKind::Firebase),
            "postgres" => Ok(SinkKind::Postgres),
            "none" => Ok(SinkKind::None),
            other => anyhow::bail!("invalid scan sink: {}. Must be firebase, postgres or none", other),
        }
    }
}

/// How the scan handler hands entries to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Await the sink write before answering the scanner.
    Sync,
    /// Enqueue onto a bounded queue; a background writer drains it.
    Detached { capacity: usize },
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub database_url: String,
    pub auth: Option<String>,
    pub scan_path: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub scan_sink: SinkKind,
    pub firebase: Option<FirebaseConfig>,
    pub record_mode: RecordMode,
    pub sink_timeout: Duration,
    /// Single allowed CORS origin; `None` is permissive.
    pub cors_origin: Option<String>,
}

const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Largest buffer `tokio::sync::mpsc::channel` accepts.
const MAX_QUEUE_CAPACITY: usize = usize::MAX >> 3;

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a `Config` from any key lookup. `load()` feeds it the process env.
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    let firebase = get("FIREBASE_DATABASE_URL").map(|database_url| FirebaseConfig {
        database_url,
        auth: get("FIREBASE_AUTH"),
        scan_path: get("FIREBASE_SCAN_PATH").unwrap_or_else(|| "rfidScanLogs".into()),
    });

    let scan_sink = match get("CHECKPOINT_SCAN_SINK") {
        Some(v) => v.parse()?,
        None if firebase.is_some() => SinkKind::Firebase,
        None => SinkKind::Postgres,
    };
    if scan_sink == SinkKind::Firebase && firebase.is_none() {
        anyhow::bail!("CHECKPOINT_SCAN_SINK=firebase requires FIREBASE_DATABASE_URL");
    }

    let record_mode = match get("CHECKPOINT_RECORD_MODE")
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("sync") => RecordMode::Sync,
        Some("detached") => {
            let capacity = parse_or(
                "CHECKPOINT_RECORD_QUEUE",
                get("CHECKPOINT_RECORD_QUEUE"),
                DEFAULT_QUEUE_CAPACITY,
            )?;
            if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
                anyhow::bail!(
                    "CHECKPOINT_RECORD_QUEUE must be between 1 and {}",
                    MAX_QUEUE_CAPACITY
                );
            }
            RecordMode::Detached { capacity }
        }
        Some(other) => anyhow::bail!(
            "invalid CHECKPOINT_RECORD_MODE: {}. Must be sync or detached",
            other
        ),
    };

    Ok(Config {
        port: parse_or("CHECKPOINT_PORT", get("CHECKPOINT_PORT"), 3000)?,
        database_url: get("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/checkpoint".into()),
        scan_sink,
        firebase,
        record_mode,
        sink_timeout: Duration::from_secs(parse_or(
            "CHECKPOINT_SINK_TIMEOUT_SECS",
            get("CHECKPOINT_SINK_TIMEOUT_SECS"),
            10,
        )?),
        cors_origin: get("CHECKPOINT_CORS_ORIGIN"),
    })
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> anyhow::Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {}: {}", key, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.scan_sink, SinkKind::Postgres);
        assert_eq!(cfg.record_mode, RecordMode::Sync);
        assert_eq!(cfg.sink_timeout, Duration::from_secs(10));
        assert!(cfg.firebase.is_none());
        assert!(cfg.cors_origin.is_none());
    }

    #[test]
    fn test_firebase_url_selects_firebase_sink() {
        let cfg = config_from(&[("FIREBASE_DATABASE_URL", "https://demo.firebaseio.com")]).unwrap();
        assert_eq!(cfg.scan_sink, SinkKind::Firebase);
        assert_eq!(cfg.firebase.unwrap().scan_path, "rfidScanLogs");
    }

    #[test]
    fn test_firebase_sink_requires_url() {
        assert!(config_from(&[("CHECKPOINT_SCAN_SINK", "firebase")]).is_err());
    }

    #[test]
    fn test_detached_mode_capacity() {
        let cfg = config_from(&[("CHECKPOINT_RECORD_MODE", "detached")]).unwrap();
        assert_eq!(cfg.record_mode, RecordMode::Detached { capacity: 1024 });

        let cfg = config_from(&[
            ("CHECKPOINT_RECORD_MODE", "Detached"),
            ("CHECKPOINT_RECORD_QUEUE", "16"),
        ])
        .unwrap();
        assert_eq!(cfg.record_mode, RecordMode::Detached { capacity: 16 });

        assert!(config_from(&[
            ("CHECKPOINT_RECORD_MODE", "detached"),
            ("CHECKPOINT_RECORD_QUEUE", "0"),
        ])
        .is_err());
    }

    #[test]
    fn test_rejects_queue_larger_than_channel_limit() {
        let err = config_from(&[
            ("CHECKPOINT_RECORD_MODE", "detached"),
            ("CHECKPOINT_RECORD_QUEUE", "18446744073709551615"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("CHECKPOINT_RECORD_QUEUE"), "{}", err);
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        assert!(config_from(&[("CHECKPOINT_PORT", "http")]).is_err());
        assert!(config_from(&[("CHECKPOINT_PORT", "70000")]).is_err());
        assert!(config_from(&[("CHECKPOINT_SINK_TIMEOUT_SECS", "ten")]).is_err());
        assert!(config_from(&[("CHECKPOINT_RECORD_MODE", "detached"), ("CHECKPOINT_RECORD_QUEUE", "lots")]).is_err());

        let cfg = config_from(&[("CHECKPOINT_PORT", " 8080 "), ("CHECKPOINT_SINK_TIMEOUT_SECS", "3")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.sink_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(config_from(&[("CHECKPOINT_RECORD_MODE", "eventually")]).is_err());
        assert!(config_from(&[("CHECKPOINT_SCAN_SINK", "kafka")]).is_err());
    }
}
