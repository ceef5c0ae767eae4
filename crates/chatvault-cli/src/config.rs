//! Export configuration.
//!
//! Settings come from environment variables first, then command-line flags
//! override them. Every setting has a default so a plain `chatvault` run
//! works from a checkout with `data/msgstore.db` in place.

use std::path::PathBuf;

use chatvault_engine::ExportOptions;
use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "chatvault")]
#[command(about = "Build a JSON archive from a decrypted chat backup", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Decrypted snapshot database.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Contact directory JSON (`{"phone": "name"}`).
    #[arg(long)]
    pub contacts: Option<PathBuf>,

    /// Where to write the archive.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write the archive without indentation.
    #[arg(long)]
    pub compact: bool,

    /// Leave thumbnails out of the archive.
    #[arg(long)]
    pub no_thumbnails: bool,

    /// Also write the run summary as JSON to this path.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Env: `CHATVAULT_DB`
    /// Default: `data/msgstore.db`
    pub db_path: PathBuf,

    /// Env: `CHATVAULT_CONTACTS`
    /// Default: none (no display names).
    pub contacts_path: Option<PathBuf>,

    /// Env: `CHATVAULT_OUTPUT`
    /// Default: `output/archive.json`
    pub output_path: PathBuf,

    /// Env: `CHATVAULT_PRETTY` (true/false)
    /// Default: `true`
    pub pretty: bool,

    /// Env: `CHATVAULT_THUMBNAILS` (true/false)
    /// Default: `true`
    pub include_thumbnails: bool,

    /// Env: `CHATVAULT_SUMMARY`
    /// Default: none.
    pub summary_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/msgstore.db"),
            contacts_path: None,
            output_path: PathBuf::from("output/archive.json"),
            pretty: true,
            include_thumbnails: true,
            summary_path: None,
        }
    }
}

impl ExportConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("CHATVAULT_DB") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("CHATVAULT_CONTACTS") {
            if !path.is_empty() {
                config.contacts_path = Some(PathBuf::from(path));
            }
        }

        if let Some(path) = lookup("CHATVAULT_OUTPUT") {
            config.output_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("CHATVAULT_PRETTY") {
            config.pretty = val != "false" && val != "0";
        }

        if let Some(val) = lookup("CHATVAULT_THUMBNAILS") {
            config.include_thumbnails = val != "false" && val != "0";
        }

        if let Some(path) = lookup("CHATVAULT_SUMMARY") {
            if !path.is_empty() {
                config.summary_path = Some(PathBuf::from(path));
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    /// Apply command-line overrides.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(db) = cli.db {
            self.db_path = db;
        }
        if let Some(contacts) = cli.contacts {
            self.contacts_path = Some(contacts);
        }
        if let Some(out) = cli.out {
            self.output_path = out;
        }
        if cli.compact {
            self.pretty = false;
        }
        if cli.no_thumbnails {
            self.include_thumbnails = false;
        }
        if let Some(summary) = cli.summary {
            self.summary_path = Some(summary);
        }
        self
    }

    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            include_thumbnails: self.include_thumbnails,
            pretty: self.pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> ExportConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExportConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.db_path, PathBuf::from("data/msgstore.db"));
        assert_eq!(config.output_path, PathBuf::from("output/archive.json"));
        assert!(config.pretty);
        assert!(config.include_thumbnails);
        assert_eq!(config.contacts_path, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = lookup(&[
            ("CHATVAULT_DB", "/snapshots/msgstore.db"),
            ("CHATVAULT_CONTACTS", "contacts.json"),
            ("CHATVAULT_PRETTY", "0"),
            ("CHATVAULT_THUMBNAILS", "false"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/snapshots/msgstore.db"));
        assert_eq!(config.contacts_path, Some(PathBuf::from("contacts.json")));
        assert!(!config.pretty);
        assert!(!config.include_thumbnails);
    }

    #[test]
    fn test_empty_optional_paths_are_ignored() {
        let config = lookup(&[("CHATVAULT_CONTACTS", ""), ("CHATVAULT_SUMMARY", "")]);
        assert_eq!(config.contacts_path, None);
        assert_eq!(config.summary_path, None);
    }

    #[test]
    fn test_flags_override_env() {
        let env = lookup(&[("CHATVAULT_OUTPUT", "env.json"), ("CHATVAULT_PRETTY", "true")]);
        let cli = Cli::try_parse_from([
            "chatvault",
            "--out",
            "flag.json",
            "--compact",
            "--no-thumbnails",
        ])
        .unwrap();

        let config = env.with_cli(cli);
        assert_eq!(config.output_path, PathBuf::from("flag.json"));
        assert_eq!(
            config.options(),
            ExportOptions {
                include_thumbnails: false,
                pretty: false,
            }
        );
    }

    #[test]
    fn test_no_flags_keep_env() {
        let env = lookup(&[("CHATVAULT_DB", "env.db")]);
        let config = env.clone().with_cli(Cli::default());
        assert_eq!(config, env);
    }
}
