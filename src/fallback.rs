//! External player fallback chain.
//!
//! Tried only when the built-in session cannot be started. Candidates are
//! attempted in a fixed priority order; a candidate whose binary is not
//! installed is skipped silently (debug log only). The stream URL is handed
//! off together with the user-agent flag each player understands, and the
//! spawned player is fully detached; it owns playback from then on.

use crate::error::{Result, ZapperError};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How a player takes a user agent on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAgentStyle {
    /// `--user-agent=<ua>` (mpv)
    MpvFlag,
    /// `:http-user-agent=<ua>` item option after the URL (VLC)
    VlcOption,
    /// `-user_agent <ua>` before the input (ffplay)
    FfplayFlag,
}

/// One external player application.
#[derive(Debug, Clone)]
pub struct PlayerCandidate {
    /// Short name reported to the caller on success.
    pub name: &'static str,
    /// Binary looked up on PATH, or an absolute path.
    pub bin: String,
    pub user_agent_style: UserAgentStyle,
    /// Fixed arguments (fullscreen and the like).
    pub extra_args: &'static [&'static str],
}

impl PlayerCandidate {
    /// Argument order matters: ffplay wants options before the input,
    /// VLC wants item options after it.
    fn args(&self, url: &str, user_agent: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        match self.user_agent_style {
            UserAgentStyle::VlcOption => {
                args.extend(self.extra_args.iter().map(|s| s.to_string()));
                args.push(url.to_string());
                if let Some(ua) = user_agent {
                    args.push(format!(":http-user-agent={ua}"));
                }
            }
            UserAgentStyle::MpvFlag => {
                args.extend(self.extra_args.iter().map(|s| s.to_string()));
                if let Some(ua) = user_agent {
                    args.push(format!("--user-agent={ua}"));
                }
                args.push(url.to_string());
            }
            UserAgentStyle::FfplayFlag => {
                args.extend(self.extra_args.iter().map(|s| s.to_string()));
                if let Some(ua) = user_agent {
                    args.push("-user_agent".to_string());
                    args.push(ua.to_string());
                }
                args.push(url.to_string());
            }
        }

        args
    }
}

/// Ordered list of external players to try.
pub struct FallbackChain {
    candidates: Vec<PlayerCandidate>,
}

impl FallbackChain {
    pub fn new(candidates: Vec<PlayerCandidate>) -> Self {
        Self { candidates }
    }

    /// The stock chain: VLC first (the original's preferred external
    /// player), then a plain mpv window, then ffplay as the last resort.
    pub fn default_chain(mpv_bin: &str) -> Self {
        Self::new(vec![
            PlayerCandidate {
                name: "vlc",
                bin: "vlc".to_string(),
                user_agent_style: UserAgentStyle::VlcOption,
                extra_args: &["--fullscreen"],
            },
            PlayerCandidate {
                name: "mpv",
                bin: mpv_bin.to_string(),
                user_agent_style: UserAgentStyle::MpvFlag,
                extra_args: &["--force-window=yes", "--fullscreen"],
            },
            PlayerCandidate {
                name: "ffplay",
                bin: "ffplay".to_string(),
                user_agent_style: UserAgentStyle::FfplayFlag,
                extra_args: &["-autoexit", "-infbuf"],
            },
        ])
    }

    /// Try each candidate in order; the first successful spawn wins.
    ///
    /// # Errors
    /// [`ZapperError::NoPlayerAvailable`] once every candidate has been
    /// skipped.
    pub fn launch(&self, url: &str, user_agent: Option<&str>) -> Result<&'static str> {
        for candidate in &self.candidates {
            match spawn_detached(&candidate.bin, &candidate.args(url, user_agent)) {
                Ok(()) => {
                    info!("Handed stream off to {}", candidate.name);
                    return Ok(candidate.name);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} not installed, trying next candidate", candidate.name);
                }
                Err(e) => {
                    warn!("Failed to launch {}: {}", candidate.name, e);
                }
            }
        }

        Err(ZapperError::NoPlayerAvailable)
    }
}

/// Spawn without waiting: the player outlives the launch request. tokio's
/// reaper collects the child when it eventually exits.
fn spawn_detached(bin: &str, args: &[String]) -> std::io::Result<()> {
    Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}
