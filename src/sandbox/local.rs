use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use super::{sandbox_name, ExecOutcome, OutputStream, SandboxError, SandboxProvider, SandboxSession};

const READ_CHUNK: usize = 8192;

/// Sandboxes backed by one directory per project under `root`.
#[derive(Debug, Clone)]
pub struct LocalSandboxProvider {
    root: PathBuf,
}

impl LocalSandboxProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sandbox_dir(&self, identifier: &str) -> PathBuf {
        self.root.join(sandbox_name(identifier))
    }
}

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    async fn connect(&self, identifier: &str) -> Result<Arc<dyn SandboxSession>, SandboxError> {
        let dir = self.sandbox_dir(identifier);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SandboxError::Connect(format!("{}: {}", dir.display(), e)))?;
        debug!(sandbox = %dir.display(), "Local sandbox ready");
        Ok(Arc::new(LocalSandbox::new(dir)))
    }
}

/// A sandbox session rooted at a directory; commands run through `sh -c`.
#[derive(Debug)]
pub struct LocalSandbox {
    root: PathBuf,
    env: Mutex<HashMap<String, String>>,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            env: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a sandbox-relative path, refusing anything that could escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(SandboxError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SandboxSession for LocalSandbox {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let target = self.resolve(path)?;
        debug!(path, bytes = content.len(), "Writing sandbox file");
        tokio::fs::write(target, content).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        let target = self.resolve(path)?;
        match tokio::fs::read_to_string(target).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SandboxError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn make_directory(&self, path: &str, recursive: bool) -> Result<(), SandboxError> {
        let target = self.resolve(path)?;
        if recursive {
            tokio::fs::create_dir_all(target).await?;
        } else {
            tokio::fs::create_dir(target).await?;
        }
        Ok(())
    }

    async fn set_environment(&self, vars: Vec<(String, String)>) -> Result<(), SandboxError> {
        let mut env = self.env.lock().expect("sandbox env lock poisoned");
        *env = vars.into_iter().collect();
        Ok(())
    }

    #[instrument(skip(self, on_output), fields(sandbox = %self.root.display()))]
    async fn execute(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputStream, String) + Send),
    ) -> Result<ExecOutcome, SandboxError> {
        let env = self.env.lock().expect("sandbox env lock poisoned").clone();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Exec(e.to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, OutputStream::Primary, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, OutputStream::Secondary, tx));
        }

        // Closes once both pumps hit EOF.
        while let Some((stream, data)) = rx.recv().await {
            on_output(stream, data);
        }

        let status = child.wait().await?;
        debug!(exit_code = ?status.code(), "Sandbox command finished");
        Ok(ExecOutcome {
            exit_code: status.code(),
        })
    }
}

/// Forward a pipe as UTF-8 chunks, holding back a split multi-byte sequence
/// until the rest of it arrives.
async fn pump<R>(mut reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<(OutputStream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        let ready = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => pending.len(),
        };
        if ready == 0 {
            continue;
        }

        let chunk = String::from_utf8_lossy(&pending[..ready]).into_owned();
        pending.drain(..ready);
        if tx.send((stream, chunk)).is_err() {
            return;
        }
    }

    if !pending.is_empty() {
        let _ = tx.send((stream, String::from_utf8_lossy(&pending).into_owned()));
    }
}
