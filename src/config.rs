// config.rs: lariza configuration
//
// Settings come from the environment (read once at startup) and the command
// line. Everything is optional.
//
//   LARIZA_FIFO_SUFFIX   cooperation group                  (default: main)
//   LARIZA_HOME_URI      opened when no URI is given        (default: about:blank)
//   LARIZA_DOWNLOAD_DIR  where downloads land, ~ expanded   (default: /var/tmp)
//   LARIZA_ARBITRATION   probe | lock                       (default: probe)
//   LARIZA_CONFIG_DIR    overrides $XDG_CONFIG_HOME/lariza
//
//   lariza [-e XID] [-C] [-T] [URI]...

use std::path::PathBuf;

use clap::Parser;

use crate::coop::{Arbitration, CoopSettings};
use crate::tabbed::{parse_xid, Xid};
use crate::util::{config_home, expand_tilde, runtime_dir};

pub const APP_NAME: &str = "lariza";

const ENV_PREFIX: &str = "LARIZA_";

// ── top-level ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub fifo_suffix: String,
    pub home_uri: String,
    pub download_dir: PathBuf,
    pub arbitration: Arbitration,
    pub runtime_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.into(),
            fifo_suffix: "main".into(),
            home_uri: "about:blank".into(),
            download_dir: PathBuf::from("/var/tmp"),
            arbitration: Arbitration::Probe,
            runtime_dir: runtime_dir(),
            config_dir: config_home().join(APP_NAME),
        }
    }
}

// ── loading ───────────────────────────────────────────────────────────────────

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Config::default();

        if let Some(v) = var("FIFO_SUFFIX") {
            cfg.fifo_suffix = v;
        }
        if let Some(v) = var("HOME_URI").filter(|v| !v.trim().is_empty()) {
            cfg.home_uri = v;
        }
        if let Some(v) = var("DOWNLOAD_DIR").filter(|v| !v.trim().is_empty()) {
            cfg.download_dir = PathBuf::from(expand_tilde(v.trim()));
        }
        if let Some(v) = var("ARBITRATION") {
            match parse_arbitration(&v) {
                Some(a) => cfg.arbitration = a,
                None => tracing::warn!("{ENV_PREFIX}ARBITRATION: unknown strategy `{v}`"),
            }
        }
        if let Some(v) = var("CONFIG_DIR").filter(|v| !v.trim().is_empty()) {
            cfg.config_dir = PathBuf::from(expand_tilde(v.trim()));
        }

        tracing::debug!(
            "Config loaded: suffix={:?} home={:?} downloads={} arbitration={:?}",
            cfg.fifo_suffix,
            cfg.home_uri,
            cfg.download_dir.display(),
            cfg.arbitration
        );
        cfg
    }

    pub fn coop_settings(&self) -> CoopSettings {
        CoopSettings {
            runtime_dir: self.runtime_dir.clone(),
            app_name: self.app_name.clone(),
            suffix: Some(self.fifo_suffix.clone()),
            arbitration: self.arbitration,
        }
    }

    pub fn keywords_path(&self) -> PathBuf {
        self.config_dir.join("keywordsearch")
    }
}

// ── command line ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Parser)]
#[command(name = APP_NAME, about = "Single-instance URI dispatcher")]
pub struct Cli {
    /// Embed windows into this X11 window (decimal or 0x-hex); implies -T
    #[arg(short = 'e', value_name = "XID", value_parser = parse_xid_arg)]
    pub embed: Option<Xid>,

    /// Do not cooperate with other instances
    #[arg(short = 'C')]
    pub no_cooperation: bool,

    /// Do not launch tabbed
    #[arg(short = 'T')]
    pub no_tabbed: bool,

    /// URIs, host names or local paths to open
    #[arg(value_name = "URI")]
    pub uris: Vec<String>,
}

impl Cli {
    pub fn cooperative(&self) -> bool {
        !self.no_cooperation
    }

    pub fn tabbed_automagic(&self) -> bool {
        !self.no_tabbed && self.embed.is_none()
    }
}

fn parse_xid_arg(s: &str) -> Result<Xid, String> {
    let s = s.trim();
    let parsed = if s.starts_with("0x") || s.starts_with("0X") {
        parse_xid(s).map_err(|e| e.to_string())
    } else {
        s.parse::<Xid>().map_err(|e| format!("bad XID `{s}`: {e}"))
    };
    match parsed? {
        0 => Err("XID must be non-zero".into()),
        xid => Ok(xid),
    }
}

// ── primitive parsers ─────────────────────────────────────────────────────────

fn parse_arbitration(s: &str) -> Option<Arbitration> {
    match s.trim().to_lowercase().as_str() {
        "probe" | "" => Some(Arbitration::Probe),
        "lock" | "flock" => Some(Arbitration::Lock),
        _ => None,
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = from(&[]);
        assert_eq!(cfg.fifo_suffix, "main");
        assert_eq!(cfg.home_uri, "about:blank");
        assert_eq!(cfg.download_dir, PathBuf::from("/var/tmp"));
        assert_eq!(cfg.arbitration, Arbitration::Probe);
    }

    #[test]
    fn environment_overrides() {
        let cfg = from(&[
            ("LARIZA_FIFO_SUFFIX", "work"),
            ("LARIZA_HOME_URI", "https://start.example"),
            ("LARIZA_DOWNLOAD_DIR", "/srv/dl"),
            ("LARIZA_ARBITRATION", "Lock"),
            ("LARIZA_CONFIG_DIR", "/etc/lariza"),
        ]);
        assert_eq!(cfg.fifo_suffix, "work");
        assert_eq!(cfg.home_uri, "https://start.example");
        assert_eq!(cfg.download_dir, PathBuf::from("/srv/dl"));
        assert_eq!(cfg.arbitration, Arbitration::Lock);
        assert_eq!(cfg.keywords_path(), PathBuf::from("/etc/lariza/keywordsearch"));
    }

    #[test]
    fn unknown_arbitration_keeps_default() {
        let cfg = from(&[("LARIZA_ARBITRATION", "consensus")]);
        assert_eq!(cfg.arbitration, Arbitration::Probe);
    }

    #[test]
    fn coop_settings_carry_suffix() {
        let mut cfg = from(&[("LARIZA_FIFO_SUFFIX", "play")]);
        cfg.runtime_dir = PathBuf::from("/run/user/1000");
        assert_eq!(
            cfg.coop_settings().fifo_path(),
            PathBuf::from("/run/user/1000/lariza.fifo-play")
        );
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::try_parse_from(["lariza", "-C", "-T", "example.com", "about:blank"]).unwrap();
        assert!(!cli.cooperative());
        assert!(!cli.tabbed_automagic());
        assert_eq!(cli.uris, vec!["example.com", "about:blank"]);
    }

    #[test]
    fn cli_embed_disables_tabbed() {
        let cli = Cli::try_parse_from(["lariza", "-e", "0x1e00003"]).unwrap();
        assert_eq!(cli.embed, Some(0x1e00003));
        assert!(cli.cooperative());
        assert!(!cli.tabbed_automagic());

        let cli = Cli::try_parse_from(["lariza", "-e", "31457283"]).unwrap();
        assert_eq!(cli.embed, Some(31457283));
    }

    #[test]
    fn cli_rejects_bad_xid() {
        assert!(Cli::try_parse_from(["lariza", "-e", "window"]).is_err());
        assert!(Cli::try_parse_from(["lariza", "-e", "0"]).is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["lariza"]).unwrap();
        assert!(cli.cooperative());
        assert!(cli.tabbed_automagic());
        assert!(cli.uris.is_empty());
    }
}
