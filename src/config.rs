//! Contains the settings used to set up both cache tiers.
//!
//! Settings are read from a **YAML** document. Both sections are optional, so that an
//! application can e.g. only enable the memory tier:
//!
//! ```yaml
//! memory:
//!     # Specifies the maximal amount of memory to use (in bytes).
//!     # Supports common suffixes like: k, m, g, t
//!     max_size: 64m
//!     # Specifies the time to live of each entry. Supports common suffixes like: ms, s, m, h, d
//!     ttl: 60s
//!     # Logs hits and misses on debug level.
//!     debug: false
//! persistent:
//!     # The root directory which contains the value files, the tag files and the manifest.
//!     dir: cache
//!     # Tags which are always considered stale.
//!     base_tags: [ 'drafts' ]
//!     debug: false
//! ```
//!
//! # Examples
//! ```
//! # use std::time::Duration;
//! # use tiercache::config::Settings;
//! let settings = Settings::parse("
//! memory:
//!     max_size: 1k
//!     ttl: 15s
//! ").unwrap();
//!
//! let memory = settings.memory.unwrap();
//! assert_eq!(memory.max_size, 1024);
//! assert_eq!(memory.ttl, Duration::from_secs(15));
//! assert_eq!(settings.persistent.is_none(), true);
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use yaml_rust::{Yaml, YamlLoader};

use crate::fmt::{format_duration, format_size, parse_duration, parse_size};

/// Default memory budget of a [MemoryCache](crate::memory::MemoryCache).
pub const DEFAULT_MAX_SIZE: usize = 64 * 1024 * 1024;

/// Default time to live of entries in a [MemoryCache](crate::memory::MemoryCache).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Settings of the in-memory tier.
#[derive(Clone, Debug, PartialEq)]
pub struct MemorySettings {
    /// The maximal number of bytes (as determined by the serializer) to keep.
    pub max_size: usize,
    /// The lifetime of each entry, measured from its last write.
    pub ttl: Duration,
    /// Determines if hits and misses are logged.
    pub debug: bool,
}

impl Default for MemorySettings {
    fn default() -> Self {
        MemorySettings {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
            debug: false,
        }
    }
}

/// Settings of the persistent tier.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistentSettings {
    /// The root directory of the cache.
    pub dir: PathBuf,
    /// Tags which always invalidate an entry carrying them.
    pub base_tags: Vec<String>,
    /// Determines if hits and misses are logged.
    pub debug: bool,
}

impl PersistentSettings {
    /// Creates settings for a cache rooted in the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PersistentSettings {
            dir: dir.into(),
            base_tags: Vec::new(),
            debug: false,
        }
    }
}

/// Combines the settings of both tiers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    /// Settings for the memory tier, if present in the config.
    pub memory: Option<MemorySettings>,
    /// Settings for the persistent tier, if present in the config.
    pub persistent: Option<PersistentSettings>,
}

impl Settings {
    /// Reads and parses the given settings file.
    pub async fn load(file: impl AsRef<Path>) -> anyhow::Result<Settings> {
        let file = file.as_ref();
        log::info!("Loading cache settings from {}...", file.to_string_lossy());

        let data = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Cannot load settings file {}", file.to_string_lossy()))?;

        Settings::parse(&data)
    }

    /// Parses settings from the given YAML string.
    ///
    /// Missing sections yield **None**, whereas an invalid section results in an error which
    /// names the offending property.
    pub fn parse(data: &str) -> anyhow::Result<Settings> {
        let docs = YamlLoader::load_from_str(data).context("Cannot parse settings")?;
        let root = match docs.into_iter().next() {
            Some(doc) => doc,
            None => return Ok(Settings::default()),
        };

        let memory = match &root["memory"] {
            Yaml::BadValue | Yaml::Null => None,
            section => Some(parse_memory(section).context("Invalid 'memory' settings")?),
        };

        let persistent = match &root["persistent"] {
            Yaml::BadValue | Yaml::Null => None,
            section => Some(parse_persistent(section).context("Invalid 'persistent' settings")?),
        };

        Ok(Settings { memory, persistent })
    }
}

fn parse_memory(section: &Yaml) -> anyhow::Result<MemorySettings> {
    let mut settings = MemorySettings::default();

    if let Some(max_size) = scalar(&section["max_size"], "max_size")? {
        settings.max_size = parse_size(max_size).context("Failed to parse 'max_size'")?;
    }
    if let Some(ttl) = scalar(&section["ttl"], "ttl")? {
        settings.ttl = parse_duration(ttl).context("Failed to parse 'ttl'")?;
    }
    settings.debug = flag(&section["debug"], "debug")?;

    log::debug!(
        "Memory tier: max_size={}, ttl={}",
        format_size(settings.max_size),
        format_duration(settings.ttl)
    );

    Ok(settings)
}

fn parse_persistent(section: &Yaml) -> anyhow::Result<PersistentSettings> {
    let dir = section["dir"]
        .as_str()
        .filter(|dir| !dir.is_empty())
        .context("Missing config 'dir'!")?;

    let mut settings = PersistentSettings::new(dir);
    settings.debug = flag(&section["debug"], "debug")?;

    match &section["base_tags"] {
        Yaml::BadValue | Yaml::Null => (),
        Yaml::Array(tags) => {
            for tag in tags {
                let tag = tag
                    .as_str()
                    .context("'base_tags' must only contain strings")?;
                settings.base_tags.push(tag.to_owned());
            }
        }
        _ => return Err(anyhow::anyhow!("'base_tags' must be a list")),
    }

    Ok(settings)
}

/// Reads a value which may either be given as number or as string with a unit suffix.
fn scalar(value: &Yaml, name: &str) -> anyhow::Result<Option<String>> {
    match value {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(number) => Ok(Some(number.to_string())),
        Yaml::String(string) => Ok(Some(string.clone())),
        _ => Err(anyhow::anyhow!("'{}' must be a number or a string", name)),
    }
}

fn flag(value: &Yaml, name: &str) -> anyhow::Result<bool> {
    match value {
        Yaml::BadValue | Yaml::Null => Ok(false),
        Yaml::Boolean(flag) => Ok(*flag),
        _ => Err(anyhow::anyhow!("'{}' must be either true or false", name)),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MemorySettings, PersistentSettings, Settings};
    use crate::testing::test_async;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn both_tiers_are_parsed() {
        let settings = Settings::parse(
            "
memory:
    max_size: 2m
    ttl: 5m
    debug: true
persistent:
    dir: target/cache
    base_tags: [ 'drafts', 'preview' ]
",
        )
        .unwrap();

        assert_eq!(
            settings.memory.unwrap(),
            MemorySettings {
                max_size: 2 * 1024 * 1024,
                ttl: Duration::from_secs(5 * 60),
                debug: true,
            }
        );
        assert_eq!(
            settings.persistent.unwrap(),
            PersistentSettings {
                dir: PathBuf::from("target/cache"),
                base_tags: vec!["drafts".to_owned(), "preview".to_owned()],
                debug: false,
            }
        );
    }

    #[test]
    fn defaults_are_applied() {
        let settings = Settings::parse("memory: { max_size: 512 }").unwrap();
        let memory = settings.memory.unwrap();
        assert_eq!(memory.max_size, 512);
        assert_eq!(memory.ttl, Duration::from_secs(60));
        assert_eq!(memory.debug, false);

        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn invalid_settings_are_reported() {
        assert!(Settings::parse("memory: { max_size: 12x }").is_err());
        assert!(Settings::parse("memory: { ttl: [1, 2] }").is_err());
        assert!(Settings::parse("memory: { debug: 'yes' }").is_err());
        assert!(Settings::parse("persistent: { base_tags: [] }").is_err());
        assert!(Settings::parse("persistent: { dir: x, base_tags: 'drafts' }").is_err());
        assert!(Settings::parse("memory: \"test").is_err());
    }

    #[test]
    fn settings_can_be_loaded_from_disk() {
        test_async(async {
            let file = PathBuf::from("target/tiercache-settings-test.yml");
            tokio::fs::create_dir_all("target").await.unwrap();
            tokio::fs::write(&file, "persistent: { dir: 'target/from-file' }")
                .await
                .unwrap();

            let settings = Settings::load(&file).await.unwrap();
            assert_eq!(
                settings.persistent.unwrap().dir,
                PathBuf::from("target/from-file")
            );

            assert!(Settings::load("target/does-not-exist.yml").await.is_err());
        });
    }
}
