//! Runtime configuration for the vanity onion generator.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::coordinator::SearchRequest;
use crate::matcher::{Prefix, PrefixError};

/// Cwtch's "no password" profile password.
pub const DEFAULT_PASSWORD: &str = "be gay do crime";

/// Environment variable consulted when `-password` is not given.
pub const PASSWORD_ENV: &str = "PROFILE_PASSWORD";

/// Long flags that consume the following argument as their value.
const VALUE_FLAGS: &[&str] = &["prefix", "password", "cpus", "out-dir"];

/// Tor v3 vanity onion address generator for Cwtch profiles
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Desired vanity prefix for onion address
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Keep searching for vanities with the same prefix after finding one
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub keep_going: bool,

    /// Password for the Cwtch profile (falls back to $PROFILE_PASSWORD)
    #[arg(long, allow_hyphen_values = true)]
    pub password: Option<String>,

    /// Number of CPUs to use (default: all cores)
    #[arg(long)]
    pub cpus: Option<usize>,

    /// Directory receiving the exported `<onion>.tar.gz` bundles
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Everything the search needs, resolved once at startup.
#[derive(Clone)]
pub struct Settings {
    pub request: SearchRequest,
    /// Prefix as typed, used as the profile name
    pub profile_name: String,
    pub password: String,
    pub out_dir: PathBuf,
}

impl Config {
    /// Parses the process arguments, accepting Go-style `-flag` spellings.
    pub fn from_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.cpus.unwrap_or_else(num_cpus::get)
    }

    /// Password precedence: non-empty flag, then non-empty `env`, then the
    /// default.
    pub fn password<F>(&self, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| env(PASSWORD_ENV).filter(|p| !p.is_empty()))
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_owned())
    }

    /// Validates the configuration and resolves it into [`Settings`].
    pub fn settings<F>(&self, env: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.prefix.is_empty() {
            return Err(ConfigError::MissingPrefix);
        }
        let prefix = Prefix::parse(&self.prefix)?;
        let request = SearchRequest::new(prefix, self.worker_count(), self.keep_going)
            .map_err(|_| ConfigError::NoWorkers)?;

        Ok(Settings {
            request,
            profile_name: self.prefix.clone(),
            password: self.password(env),
            out_dir: self.out_dir.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Please specify a vanity prefix using -prefix flag")]
    MissingPrefix,

    #[error("Invalid prefix: {0}")]
    InvalidPrefix(#[from] PrefixError),

    #[error("-cpus must be at least 1")]
    NoWorkers,
}

/// Rewrites single-dash long flags (`-prefix abc`, `-cpus=4`) into the
/// double-dash form clap expects. Values following a flag are left alone, as
/// is everything after a bare `--`.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut expects_value = false;
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || passthrough || expects_value {
            expects_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };

        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let name = text.trim_start_matches('-');
        let dashes = text.len() - name.len();
        let is_long_flag = (dashes == 1 && name.len() > 1) || dashes == 2;

        if !is_long_flag {
            out.push(arg);
            continue;
        }

        expects_value = !name.contains('=') && VALUE_FLAGS.contains(&name);
        out.push(format!("--{}", name).into());
    }

    out
}
