use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, info, trace, warn};

/// Settings nexus reads, with their built-in values.
const DEFAULTS: [(&str, &str); 5] = [
    ("data.location", "~/.nexus"),
    ("board.horizons", "inbox,now,next,later,done"),
    ("board.all_includes_done", "no"),
    ("theme", "dark"),
    ("color", "on"),
];

const RC_ENV: &str = "NEXUSRC";

/// nexusrc settings layered over the defaults, then over by `rc.` overrides.
#[derive(Debug, Clone)]
pub struct Config {
    values: HashMap<String, String>,
    sources: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
    Blank,
    Include(&'a str),
    Setting(&'a str, &'a str),
}

/// `None` means the line is neither blank, an include, nor `key = value`.
fn parse_line(line: &str) -> Option<RcLine<'_>> {
    let content = line
        .split_once('#')
        .map_or(line, |(before, _)| before)
        .trim();
    if content.is_empty() {
        return Some(RcLine::Blank);
    }
    if let Some(target) = content.strip_prefix("include ") {
        return Some(RcLine::Include(target.trim()));
    }
    let (key, value) = content.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some(RcLine::Setting(key, value.trim()))
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        match rc_path(rc_override) {
            Some(path) => {
                info!(nexusrc = %path.display(), "loading nexusrc");
                cfg.read_rc(&expand_tilde(&path))?;
            }
            None => debug!("no nexusrc found; using defaults"),
        }
        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            let name = key.strip_prefix("rc.").unwrap_or(&key).to_string();
            debug!(key = %name, value = %value, "applying override");
            self.set(name, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(parse_bool)
    }

    /// rc files read so far, includes after the file naming them.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    fn set(&mut self, key: String, value: String) {
        if !DEFAULTS.iter().any(|(known, _)| *known == key) {
            warn!(key = %key, "ignoring unknown setting");
            return;
        }
        self.values.insert(key, value);
    }

    fn read_rc(&mut self, path: &Path) -> anyhow::Result<()> {
        if self.sources.iter().any(|seen| seen == path) {
            warn!(file = %path.display(), "nexusrc already read; skipping include");
            return Ok(());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.sources.push(path.to_path_buf());
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        for (idx, raw) in text.lines().enumerate() {
            match parse_line(raw) {
                Some(RcLine::Blank) => {}
                Some(RcLine::Include(target)) => {
                    if target.is_empty() {
                        bail!("{}:{}: include needs a path", path.display(), idx + 1);
                    }
                    let included = dir.join(expand_tilde(Path::new(target)));
                    if included.exists() {
                        self.read_rc(&included)?;
                    } else {
                        warn!(include = %included.display(), "include file does not exist; skipping");
                    }
                }
                Some(RcLine::Setting(key, value)) => {
                    trace!(key, value, "loaded setting");
                    self.set(key.to_string(), value.to_string());
                }
                None => bail!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    idx + 1,
                    raw.trim()
                ),
            }
        }
        Ok(())
    }
}

/// `--data` wins over `data.location`; the directory is created if missing.
#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match (override_dir, cfg.get("data.location")) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(location)) => expand_tilde(Path::new(location)),
        (None, None) => dirs::home_dir()
            .map(|home| home.join(".nexus"))
            .context("cannot determine home directory")?,
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
    }
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

/// `--nexusrc`, then `$NEXUSRC` (`/dev/null` turns the file off), then
/// `~/.nexusrc` when it exists.
fn rc_path(rc_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = rc_override {
        return Some(path.to_path_buf());
    }
    if let Some(env) = std::env::var_os(RC_ENV) {
        let path = PathBuf::from(env);
        return (path != Path::new("/dev/null")).then_some(path);
    }
    let candidate = dirs::home_dir()?.join(".nexusrc");
    candidate.exists().then_some(candidate)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}
