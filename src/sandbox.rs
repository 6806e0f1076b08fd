//! Execution sandbox
//!
//! Child processes get a fresh temporary directory as both `HOME` and working
//! directory, a cleared environment with a pinned `PATH`, and no stdin. Output
//! is read in bounded chunks and capped. Each child leads its own process
//! group; termination signals the whole group, SIGTERM first and SIGKILL
//! after a grace period. Dropping the sandbox removes the directory.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::{ExecutorConfig, PROXY_VARS};

/// Appended to output that hit the cap
pub const TRUNCATION_MARKER: &str = "[output truncated]";

const READ_CHUNK: usize = 8 * 1024;

/// Variables the sandbox always sets; config cannot override them
const PINNED_VARS: &[&str] = &["PATH", "HOME", "TMPDIR"];

/// A temporary, minimal environment for one command
pub struct Sandbox {
    dir: TempDir,
    env: BTreeMap<String, String>,
}

impl Sandbox {
    pub fn new(config: &ExecutorConfig) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("nixtalk-").tempdir()?;
        let env = build_env(config, dir.path(), |key| std::env::var(key).ok());
        debug!(dir = %dir.path().display(), vars = env.len(), "created sandbox");
        Ok(Self { dir, env })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// A command configured to run inside this sandbox
    pub fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(&self.env)
            .current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so descendants can be signalled together
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }
        cmd
    }
}

/// Environment for a sandboxed child. `lookup` reads the parent environment.
pub fn build_env<F>(config: &ExecutorConfig, home: &Path, lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = BTreeMap::new();

    let forwarded = config
        .passthrough_env
        .iter()
        .map(String::as_str)
        .chain(PROXY_VARS.iter().copied().filter(|_| config.allow_proxy));
    for key in forwarded {
        if let Some(value) = lookup(key) {
            env.insert(key.to_string(), value);
        }
    }

    for (key, value) in &config.extra_env {
        env.insert(key.clone(), value.clone());
    }

    // Config may never smuggle proxies or override the pinned variables
    env.retain(|key, _| !PINNED_VARS.contains(&key.as_str()));
    if !config.allow_proxy {
        env.retain(|key, _| !PROXY_VARS.contains(&key.as_str()));
    }

    let home = home.to_string_lossy().into_owned();
    env.insert("PATH".to_string(), config.sandbox_path.clone());
    env.insert("HOME".to_string(), home.clone());
    env.insert("TMPDIR".to_string(), home);
    env.insert("NO_COLOR".to_string(), "1".to_string());
    env.insert("LC_ALL".to_string(), "C".to_string());
    env
}

/// Output read from one stream, possibly cut at the cap
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapturedOutput {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl CapturedOutput {
    /// Lossy text, with the truncation marker appended when cut
    pub fn text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            if !text.ends_with('\n') && !text.is_empty() {
                text.push('\n');
            }
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Read a stream to the end, keeping at most `cap` bytes. The rest is
/// drained and discarded so the child never blocks on a full pipe.
pub async fn read_capped<R>(mut reader: R, cap: usize) -> io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut out = CapturedOutput::default();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(out.bytes.len());
        if n > room {
            out.truncated = true;
        }
        out.bytes.extend_from_slice(&buf[..n.min(room)]);
    }

    Ok(out)
}

/// The process group a sandboxed child leads. Dropping it SIGKILLs whatever
/// is left in the group, including descendants that outlived the child.
#[derive(Debug)]
pub struct ProcessGroup {
    pid: Option<u32>,
}

impl ProcessGroup {
    /// Record the group of a freshly spawned child (before it is reaped)
    pub fn of(child: &Child) -> Self {
        Self { pid: child.id() }
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Send `signal` to every process in the group
    #[cfg(unix)]
    pub fn signal(&self, signal: libc::c_int) -> bool {
        match self.pid {
            // SAFETY: signal delivery to the group we created with process_group(0).
            Some(pid) => unsafe { libc::kill(-(pid as libc::pid_t), signal) == 0 },
            None => false,
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if self.signal(libc::SIGKILL) {
                debug!(pgid = self.pid, "killed leftover process group");
            }
        }
    }
}

/// Stop a child and its group: SIGTERM, wait up to `grace`, then SIGKILL.
/// Always reaps the child.
pub async fn terminate(
    child: &mut Child,
    group: &ProcessGroup,
    grace: Duration,
) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        // Only descendants are left; dropping the group kills them
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if group.signal(libc::SIGTERM) {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }
            warn!(pgid = group.id(), "process group ignored SIGTERM, killing");
            if group.signal(libc::SIGKILL) {
                return child.wait().await;
            }
        }
    }

    #[cfg(not(unix))]
    let _ = (group, grace);

    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_is_minimal() {
        let config = ExecutorConfig::default();
        let parent = lookup(&[
            ("NIX_PATH", "nixpkgs=/nix/channels"),
            ("https_proxy", "http://proxy:3128"),
            ("AWS_SECRET_ACCESS_KEY", "hunter2"),
        ]);
        let env = build_env(&config, Path::new("/tmp/sbx"), parent);

        assert_eq!(env.get("HOME").map(String::as_str), Some("/tmp/sbx"));
        assert_eq!(env.get("PATH"), Some(&config.sandbox_path));
        assert_eq!(env.get("NIX_PATH").map(String::as_str), Some("nixpkgs=/nix/channels"));
        assert!(!env.contains_key("https_proxy"));
        assert!(!env.contains_key("AWS_SECRET_ACCESS_KEY"));
    }

    #[test]
    fn test_proxy_forwarded_when_allowed() {
        let config = ExecutorConfig {
            allow_proxy: true,
            ..Default::default()
        };
        let env = build_env(&config, Path::new("/tmp/sbx"), lookup(&[("https_proxy", "http://p")]));
        assert_eq!(env.get("https_proxy").map(String::as_str), Some("http://p"));
    }

    #[test]
    fn test_extra_env_cannot_override_pinned_vars() {
        let mut config = ExecutorConfig::default();
        config.extra_env.insert("PATH".into(), "/evil".into());
        config.extra_env.insert("HTTP_PROXY".into(), "http://p".into());
        config.extra_env.insert("NIXPKGS_ALLOW_UNFREE".into(), "1".into());

        let env = build_env(&config, Path::new("/tmp/sbx"), lookup(&[]));
        assert_eq!(env.get("PATH"), Some(&config.sandbox_path));
        assert!(!env.contains_key("HTTP_PROXY"));
        assert_eq!(env.get("NIXPKGS_ALLOW_UNFREE").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_read_capped_under_cap() {
        let out = read_capped(&b"hello\n"[..], 1024).await.unwrap();
        assert_eq!(out.bytes, b"hello\n");
        assert!(!out.truncated);
        assert_eq!(out.text(), "hello\n");
    }

    #[tokio::test]
    async fn test_read_capped_truncates_and_drains() {
        let data = vec![b'x'; 50_000];
        let out = read_capped(&data[..], 100).await.unwrap();
        assert_eq!(out.bytes.len(), 100);
        assert!(out.truncated);
        assert!(out.text().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_sandbox_dir_removed_on_drop() {
        let sandbox = Sandbox::new(&ExecutorConfig::default()).unwrap();
        let path = sandbox.path().to_path_buf();
        assert!(path.is_dir());
        assert_eq!(sandbox.env().get("HOME").map(String::as_str), path.to_str());
        drop(sandbox);
        assert!(!path.exists());
    }
}
