use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;

use crate::models::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// IANA zone name such as `Africa/Algiers`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Invalid sweeper timezone {name:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Africa/Algiers").unwrap(), Tz::Africa__Algiers);
        assert_eq!(parse_timezone(" UTC ").unwrap(), Tz::UTC);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_load_config() {
        let path = std::env::temp_dir().join(format!("allocator-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [server]
            addr = "127.0.0.1:4000"

            [sweeper]
            timezone = "Africa/Algiers"

            [[time_slots]]
            id = "t08"
            time = "08:00"
            "#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.addr, "127.0.0.1:4000");
        assert_eq!(config.sweeper.interval_secs, 3600);
        assert_eq!(config.time_slots[0].time, "08:00");
        assert!(load_config(&path).is_err());
    }
}
