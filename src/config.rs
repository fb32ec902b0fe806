//! Configuration loading: config file defaults merged under CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use idsweep_core::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, DEFAULT_HIGHEST_ID, DEFAULT_LIBRARY,
    DEFAULT_LOWEST_ID, DEFAULT_PACING, REQUEST_TIMEOUT_SECS,
};
use idsweep_core::download::{
    DEFAULT_CONCURRENCY, EndpointTemplate, IdRange, MAX_CONCURRENCY, TemplateError,
    library_templates, parse_templates,
};

use crate::cli::Args;

const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;
const MAX_PACING_MS: u64 = 60_000;

/// File configuration for run defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default destination directory.
    pub destination_dir: Option<PathBuf>,
    /// Endpoint templates, in preference order (`endpoint_template` may repeat).
    pub endpoint_templates: Vec<String>,
    /// Server base URL for derived templates.
    pub server: Option<String>,
    /// Library name for derived templates.
    pub library: Option<String>,
    /// Highest ID (or discovery ceiling).
    pub highest_id: Option<u64>,
    /// Lowest ID.
    pub lowest_id: Option<u64>,
    /// Default concurrency (same range as CLI).
    pub concurrency: Option<u8>,
    /// Bytes per streamed write.
    pub chunk_size: Option<u64>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Delay between dispatches in milliseconds.
    pub pacing_ms: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=MAX_CONCURRENCY).contains(&usize::from(concurrency))
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 1..={MAX_CONCURRENCY}"
            );
        }
        if let Some(chunk_size) = self.chunk_size
            && !(1..=MAX_CHUNK_SIZE).contains(&chunk_size)
        {
            bail!(
                "Invalid config value for `chunk_size`: {chunk_size}. Expected range: 1..={MAX_CHUNK_SIZE}"
            );
        }
        if let Some(pacing_ms) = self.pacing_ms
            && pacing_ms > MAX_PACING_MS
        {
            bail!(
                "Invalid config value for `pacing_ms`: {pacing_ms}. Expected range: 0..={MAX_PACING_MS}"
            );
        }
        validate_positive_id("highest_id", self.highest_id)?;
        validate_positive_id("lowest_id", self.lowest_id)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        Ok(())
    }
}

fn validate_positive_id(field: &str, value: Option<u64>) -> Result<()> {
    if value == Some(0) {
        bail!("Invalid config value for `{field}`: 0. IDs start at 1");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/idsweep/config.toml`
/// 2. `$HOME/.config/idsweep/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("idsweep")
                .join("config.toml"),
        );
    }

    let home = home_dir()?;
    Some(home.join(".config").join("idsweep").join("config.toml"))
}

/// `$HOME`, when set and non-empty.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    env_var_non_empty_os("HOME").map(PathBuf::from)
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "destination_dir" => {
                cfg.destination_dir =
                    Some(PathBuf::from(parse_string_literal(value).with_context(context)?));
            }
            "endpoint_template" => {
                cfg.endpoint_templates
                    .push(parse_string_literal(value).with_context(context)?);
            }
            "server" => cfg.server = Some(parse_string_literal(value).with_context(context)?),
            "library" => cfg.library = Some(parse_string_literal(value).with_context(context)?),
            "highest_id" => cfg.highest_id = Some(parse_integer_u64(value).with_context(context)?),
            "lowest_id" => cfg.lowest_id = Some(parse_integer_u64(value).with_context(context)?),
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u8::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
                    .with_context(context)?;
                cfg.concurrency = Some(n);
            }
            "chunk_size" => cfg.chunk_size = Some(parse_integer_u64(value).with_context(context)?),
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "pacing_ms" => cfg.pacing_ms = Some(parse_integer_u64(value).with_context(context)?),
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub destination: PathBuf,
    pub templates: Vec<EndpointTemplate>,
    pub highest: u64,
    pub lowest: u64,
    pub discover: bool,
    pub concurrency: usize,
    pub chunk_size: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pacing: Duration,
}

impl RunConfig {
    /// Merges CLI flags over file values over built-in defaults.
    ///
    /// Templates come from the first source that has any: `--template`,
    /// `--server`, `endpoint_template` keys, then the `server` key.
    pub fn resolve(args: &Args, file: Option<&FileConfig>, home: Option<&Path>) -> Result<Self> {
        let file = file.cloned().unwrap_or_default();

        let destination = args
            .dest
            .clone()
            .or(file.destination_dir)
            .unwrap_or_else(|| default_destination(home));

        let library = args
            .library
            .clone()
            .or(file.library)
            .unwrap_or_else(|| DEFAULT_LIBRARY.to_string());
        let templates = if !args.templates.is_empty() {
            parse_templates(&args.templates)?
        } else if let Some(server) = &args.server {
            library_templates(server, &library)?
        } else if !file.endpoint_templates.is_empty() {
            parse_templates(&file.endpoint_templates)?
        } else if let Some(server) = &file.server {
            library_templates(server, &library)?
        } else {
            return Err(TemplateError::Empty.into());
        };

        let highest = args
            .highest
            .or(file.highest_id)
            .unwrap_or(DEFAULT_HIGHEST_ID);
        let lowest = args.lowest.or(file.lowest_id).unwrap_or(DEFAULT_LOWEST_ID);
        if !args.discover {
            IdRange::new(highest, lowest)?;
        }

        let chunk_size = match args.chunk_size.map(u64::from).or(file.chunk_size) {
            Some(bytes) => usize::try_from(bytes).context("chunk size does not fit in memory")?,
            None => DEFAULT_CHUNK_SIZE,
        };

        Ok(Self {
            destination,
            templates,
            highest,
            lowest,
            discover: args.discover,
            concurrency: usize::from(
                args.concurrency
                    .or(file.concurrency)
                    .unwrap_or(DEFAULT_CONCURRENCY as u8),
            ),
            chunk_size,
            request_timeout_secs: args
                .timeout_secs
                .or(file.request_timeout_secs)
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            pacing: args
                .pacing_ms
                .or(file.pacing_ms)
                .map_or(DEFAULT_PACING, Duration::from_millis),
        })
    }

    /// The configured range; only meaningful without discovery.
    pub fn range(&self) -> Result<IdRange> {
        Ok(IdRange::new(self.highest, self.lowest)?)
    }
}

fn default_destination(home: Option<&Path>) -> PathBuf {
    home.map_or_else(
        || PathBuf::from("idsweep-downloads"),
        |home| home.join("Downloads").join("idsweep"),
    )
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["idsweep"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
concurrency = 8
server = "http://10.0.0.2:8080"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.server.as_deref(), Some("http://10.0.0.2:8080"));
        assert!(cfg.destination_dir.is_none());
    }

    #[test]
    fn test_parse_config_repeated_templates_keep_order() {
        let cfg = parse_config_str(
            r#"
endpoint_template = "http://x/e/{}"
endpoint_template = "http://x/m/{}"  # fallback format
"#,
        )
        .unwrap();
        assert_eq!(cfg.endpoint_templates, vec!["http://x/e/{}", "http://x/m/{}"]);
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = parse_config_str("concurrency = 26").expect_err("invalid concurrency expected");
        assert!(err.to_string().contains("concurrency"));

        let err = parse_config_str("concurrency = 300").expect_err("u8 overflow expected");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens() {
        let err = parse_config_str("highest_id = 4 trailing").expect_err("trailing token");
        assert!(err.to_string().contains("highest_id"));
    }

    #[test]
    fn test_parse_config_rejects_zero_id() {
        let err = parse_config_str("lowest_id = 0").expect_err("zero id");
        assert!(err.to_string().contains("lowest_id"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("destination_dir = /books").expect_err("unquoted");
        assert!(err.to_string().contains("destination_dir"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout() {
        let err = parse_config_str("request_timeout_secs = 0").expect_err("invalid timeout");
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_parse_config_hash_inside_string_kept() {
        let cfg = parse_config_str(r##"library = "Shelf #2" # comment"##).unwrap();
        assert_eq!(cfg.library.as_deref(), Some("Shelf #2"));
    }

    #[test]
    fn test_resolve_defaults_with_server() {
        let run = RunConfig::resolve(
            &args(&["--server", "http://host:8080"]),
            None,
            Some(Path::new("/home/reader")),
        )
        .unwrap();
        assert_eq!(run.destination, PathBuf::from("/home/reader/Downloads/idsweep"));
        assert_eq!(run.highest, 18_460);
        assert_eq!(run.lowest, 1);
        assert_eq!(run.concurrency, 2);
        assert_eq!(run.chunk_size, 8192);
        assert_eq!(run.pacing, Duration::from_millis(100));
        assert_eq!(run.templates[0].url_for(5), "http://host:8080/get/EPUB/5/Library");
        assert_eq!(run.templates[1].url_for(5), "http://host:8080/get/MOBI/5/Library");
    }

    #[test]
    fn test_resolve_without_home_uses_relative_destination() {
        let run = RunConfig::resolve(&args(&["-t", "http://x/e/{}"]), None, None).unwrap();
        assert_eq!(run.destination, PathBuf::from("idsweep-downloads"));
    }

    #[test]
    fn test_resolve_without_templates_fails() {
        let err = RunConfig::resolve(&args(&[]), None, None).unwrap_err();
        assert!(err.to_string().contains("no endpoint templates"));
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let file = FileConfig {
            destination_dir: Some(PathBuf::from("/from/file")),
            endpoint_templates: vec!["http://file/e/{}".to_string()],
            concurrency: Some(5),
            pacing_ms: Some(0),
            ..FileConfig::default()
        };
        let run = RunConfig::resolve(
            &args(&["-d", "/from/cli", "-t", "http://cli/e/{}", "-c", "3"]),
            Some(&file),
            None,
        )
        .unwrap();
        assert_eq!(run.destination, PathBuf::from("/from/cli"));
        assert_eq!(run.templates.len(), 1);
        assert_eq!(run.templates[0].as_str(), "http://cli/e/{}");
        assert_eq!(run.concurrency, 3);
        assert_eq!(run.pacing, Duration::ZERO);
    }

    #[test]
    fn test_resolve_file_templates_used_when_cli_has_none() {
        let file = FileConfig {
            endpoint_templates: vec!["http://file/e/{}".to_string(), "http://file/m/{}".to_string()],
            highest_id: Some(900),
            ..FileConfig::default()
        };
        let run = RunConfig::resolve(&args(&[]), Some(&file), None).unwrap();
        assert_eq!(run.templates.len(), 2);
        assert_eq!(run.highest, 900);
    }

    #[test]
    fn test_resolve_rejects_inverted_range() {
        let err = RunConfig::resolve(
            &args(&["-t", "http://x/e/{}", "--highest", "5", "--lowest", "9"]),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid ID range"));
    }

    #[test]
    fn test_resolve_discover_ignores_lowest() {
        let run = RunConfig::resolve(
            &args(&["-t", "http://x/e/{}", "--highest", "5", "--lowest", "9", "--discover"]),
            None,
            None,
        )
        .unwrap();
        assert!(run.discover);
        assert_eq!(run.highest, 5);
    }

    #[test]
    fn test_resolve_rejects_bad_template() {
        let err = RunConfig::resolve(&args(&["-t", "http://x/e/"]), None, None).unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }
}
