// tabbed.rs: ask a `tabbed` host for a window to embed into
//
// tabbed prints the XID of its container window as hex on the first line of
// stdout and keeps running. Any failure here only means "no embedding": the
// caller opens ordinary top-level windows instead.

use std::{
    io::{BufRead, BufReader},
    process::{ChildStdout, Command, Stdio},
    sync::mpsc,
    time::Duration,
};

/// An X11 window id.
pub type Xid = u64;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TabbedError {
    #[error("could not launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("could not read XID from tabbed")]
    NoOutput,
    #[error("tabbed did not report an XID within {0:?}")]
    Timeout(Duration),
    #[error("unparsable XID `{0}`")]
    BadXid(String),
    #[error("the XID from tabbed is 0")]
    ZeroXid,
}

#[derive(Debug, Clone)]
pub struct TabbedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl TabbedCommand {
    /// `tabbed -c -d -p s1 -n <app_name>`: close when the last tab goes, print
    /// the XID, new tabs open to the right of the current one.
    pub fn for_app(app_name: &str) -> Self {
        Self {
            program: "tabbed".into(),
            args: ["-c", "-d", "-p", "s1", "-n", app_name]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Spawn the host and wait for its XID. On success the child is left
    /// running; on any failure after spawning it is killed and reaped.
    pub fn launch(&self) -> Result<Xid, TabbedError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| TabbedError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let result = match child.stdout.take() {
            Some(stdout) => self.read_xid(stdout),
            None => Err(TabbedError::NoOutput),
        };
        if result.is_err() {
            if let Err(e) = child.kill() {
                tracing::debug!("Killing {}: {e}", self.program);
            }
            let _ = child.wait();
        }
        result
    }

    fn read_xid(&self, stdout: ChildStdout) -> Result<Xid, TabbedError> {
        // The reader thread is abandoned on timeout; it exits once the
        // child's stdout closes.
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let read = BufReader::new(stdout).read_line(&mut line).map(|_| line);
            let _ = tx.send(read);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(line)) => parse_xid(&line),
            Ok(Err(e)) => {
                tracing::debug!("Reading tabbed stdout: {e}");
                Err(TabbedError::NoOutput)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(TabbedError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TabbedError::NoOutput),
        }
    }

    /// `launch`, logging failures and mapping them to "no embedding".
    pub fn launch_or_skip(&self) -> Option<Xid> {
        match self.launch() {
            Ok(xid) => {
                tracing::info!("Embedding into tabbed window {xid:#x}");
                Some(xid)
            }
            Err(e) => {
                tracing::warn!("{e}; using top-level windows");
                None
            }
        }
    }
}

/// Parse tabbed's output line: hex digits with an optional `0x` prefix.
pub fn parse_xid(line: &str) -> Result<Xid, TabbedError> {
    let s = line.trim();
    if s.is_empty() {
        return Err(TabbedError::NoOutput);
    }
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    match Xid::from_str_radix(digits, 16) {
        Ok(0) => Err(TabbedError::ZeroXid),
        Ok(xid) => Ok(xid),
        Err(_) => Err(TabbedError::BadXid(s.to_owned())),
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> TabbedCommand {
        TabbedCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            timeout,
        }
    }

    #[test]
    fn parse_hex_with_and_without_prefix() {
        assert_eq!(parse_xid("0x1e00003\n").unwrap(), 0x1e00003);
        assert_eq!(parse_xid("  1E00003 ").unwrap(), 0x1e00003);
    }

    #[test]
    fn parse_rejects_garbage_zero_and_empty() {
        assert!(matches!(parse_xid("window"), Err(TabbedError::BadXid(_))));
        assert!(matches!(parse_xid("0x0"), Err(TabbedError::ZeroXid)));
        assert!(matches!(parse_xid("\n"), Err(TabbedError::NoOutput)));
    }

    #[test]
    fn default_command_line() {
        let cmd = TabbedCommand::for_app("lariza");
        assert_eq!(cmd.program, "tabbed");
        assert_eq!(cmd.args, vec!["-c", "-d", "-p", "s1", "-n", "lariza"]);
    }

    #[test]
    fn reads_first_line_only() {
        let cmd = sh("echo 0x2a00007; echo 0x1", DEFAULT_TIMEOUT);
        assert_eq!(cmd.launch().unwrap(), 0x2a00007);
    }

    #[test]
    fn missing_program_is_skipped() {
        let cmd = TabbedCommand {
            program: "lariza-test-no-such-tabbed".into(),
            args: vec![],
            timeout: DEFAULT_TIMEOUT,
        };
        assert!(matches!(cmd.launch(), Err(TabbedError::Spawn { .. })));
        assert_eq!(cmd.launch_or_skip(), None);
    }

    #[test]
    fn silent_host_is_no_output() {
        let cmd = sh("exit 0", DEFAULT_TIMEOUT);
        assert!(matches!(cmd.launch(), Err(TabbedError::NoOutput)));
    }

    #[test]
    fn slow_host_times_out() {
        let cmd = sh("sleep 2; echo 0x1", Duration::from_millis(100));
        assert!(matches!(cmd.launch(), Err(TabbedError::Timeout(_))));
    }

    #[test]
    fn failed_launch_kills_the_host() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; echo window; sleep 30", pid_file.display());
        let cmd = sh(&script, DEFAULT_TIMEOUT);
        assert_eq!(cmd.launch_or_skip(), None);

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_dir = std::path::Path::new("/proc").join(pid.trim());
        assert!(!proc_dir.exists(), "host {} still running", pid.trim());
    }

    #[test]
    fn timed_out_host_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; sleep 30", pid_file.display());
        let cmd = sh(&script, Duration::from_millis(500));
        assert!(matches!(cmd.launch(), Err(TabbedError::Timeout(_))));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(!std::path::Path::new("/proc").join(pid.trim()).exists());
    }

    #[test]
    fn zero_xid_is_skipped() {
        let cmd = sh("echo 0", DEFAULT_TIMEOUT);
        assert_eq!(cmd.launch_or_skip(), None);
    }
}
