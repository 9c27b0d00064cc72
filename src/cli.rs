//! Command-line argument definitions and validation.

use clap::Parser;
use std::fmt;
use std::path::PathBuf;

use crate::errors::{LicenseError, LicenseResult};

/// Printed whenever the positional arguments are unusable.
pub const USAGE: &str = "Usage: licwatch [OPTIONS] <url> <username> <password>\n\
                         Please pass url, username, password as ordered args\n\
                         Use `--` before the values if the password starts with '-'";

/// licwatch - ArcGIS Server license expiration report
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ./licwatch.toml when present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Evaluate and print the report without sending email
    #[arg(long)]
    pub dry_run: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Portal URL, username and password; only the last three values are used
    #[arg(value_name = "URL USERNAME PASSWORD", num_args = 0..)]
    pub positional: Vec<String>,
}

/// Validated portal credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct MainArgs {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for MainArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainArgs")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MainArgs {
    /// Take the last three values as url, username and password.
    ///
    /// Fails when fewer than three are given or the url does not start with
    /// `http`.
    pub fn from_positionals(values: &[String]) -> LicenseResult<Self> {
        let [url, username, password] = match values {
            [.., url, username, password] => [url, username, password],
            _ => {
                return Err(LicenseError::UsageError(format!(
                    "expected 3 positional arguments, got {}",
                    values.len()
                )));
            }
        };

        if !url.starts_with("http") {
            return Err(LicenseError::UsageError(
                "first parameter must be Url".to_string(),
            ));
        }

        Ok(Self {
            url: url.clone(),
            username: username.clone(),
            password: password.clone(),
        })
    }
}

impl Args {
    pub fn main_args(&self) -> LicenseResult<MainArgs> {
        MainArgs::from_positionals(&self.positional)
    }

    /// Log level after applying `--verbose`.
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else {
            configured
        }
    }
}
