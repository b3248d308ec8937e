//! External Braille translation engines.
//!
//! [`TranslationEngine`] is the capability the translator needs: two output
//! modes and an availability probe. Whether the engine is a local process or a
//! remote service is invisible to [`crate::pipeline::braille`].
//!
//! [`LiblouisEngine`] drives the `lou_translate` command-line tool, one process
//! per request: the text goes in on stdin, the translation comes back on
//! stdout.

use crate::config::ConversionConfig;
use crate::error::EngineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// A Braille translation backend.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Cheap probe: `false` means "do not call me", never an error.
    fn is_available(&self) -> bool;

    /// Contracted (grade-2) output.
    async fn translate_contracted(&self, text: &str) -> Result<String, EngineError>;

    /// Uncontracted dot-pattern output.
    async fn translate_uncontracted(&self, text: &str) -> Result<String, EngineError>;
}

/// An engine that is never available; every translation uses the fallback table.
pub struct NoEngine;

#[async_trait]
impl TranslationEngine for NoEngine {
    fn is_available(&self) -> bool {
        false
    }

    async fn translate_contracted(&self, _text: &str) -> Result<String, EngineError> {
        Ok(String::new())
    }

    async fn translate_uncontracted(&self, _text: &str) -> Result<String, EngineError> {
        Ok(String::new())
    }
}

/// Liblouis via the `lou_translate` executable.
#[derive(Debug, Clone)]
pub struct LiblouisEngine {
    program: PathBuf,
    table: PathBuf,
    timeout_secs: u64,
}

impl LiblouisEngine {
    pub fn new(
        program: impl Into<PathBuf>,
        table: impl Into<PathBuf>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            program: program.into(),
            table: table.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(
            config.lou_translate.clone(),
            config.braille_table.clone(),
            config.engine_timeout_secs,
        )
    }

    /// Run `lou_translate [extra_args] <table>` with `text` on stdin.
    async fn run(&self, extra_args: &[&str], text: &str) -> Result<String, EngineError> {
        let mut child = Command::new(&self.program)
            .args(extra_args)
            .arg(&self.table)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let input = format!("{text}\n");
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("stdin not captured")))?;

        // Feed stdin while stdout is drained; lou_translate writes as it reads,
        // so a full stdout pipe would otherwise stall both sides.
        let feed = async move {
            let written = stdin.write_all(input.as_bytes()).await;
            // Closing stdin tells lou_translate the input is complete.
            drop(stdin);
            written
        };
        let exchange = async move {
            let (written, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            // A child that exits early breaks the pipe; its exit status says more.
            if output.status.success() {
                written?;
            }
            Ok::<_, std::io::Error>(output)
        };

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), exchange)
            .await
            .map_err(|_| EngineError::Timeout {
                secs: self.timeout_secs,
            })??;

        if !output.status.success() {
            return Err(EngineError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let translated = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            "lou_translate {:?}: {} chars in → {} chars out",
            extra_args,
            text.chars().count(),
            translated.chars().count()
        );
        Ok(translated)
    }
}

#[async_trait]
impl TranslationEngine for LiblouisEngine {
    fn is_available(&self) -> bool {
        resolve_program(&self.program).is_some() && table_present(&self.table)
    }

    async fn translate_contracted(&self, text: &str) -> Result<String, EngineError> {
        self.run(&[], text).await
    }

    async fn translate_uncontracted(&self, text: &str) -> Result<String, EngineError> {
        self.run(&["--dotsIO"], text).await
    }
}

/// Locate an executable: paths with a directory part must exist as given,
/// bare names are searched on `PATH`.
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}

/// Tables given by bare name are resolved by liblouis itself (`LOUIS_TABLEPATH`);
/// only explicit paths are checked here.
fn table_present(table: &Path) -> bool {
    if table.components().count() > 1 || table.is_absolute() {
        table.is_file()
    } else {
        !table.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_engine_is_unavailable() {
        let engine = NoEngine;
        assert!(!engine.is_available());
        assert_eq!(engine.translate_contracted("abc").await.unwrap(), "");
    }

    #[test]
    fn missing_executable_is_unavailable() {
        let engine = LiblouisEngine::new(
            "/definitely/not/here/lou_translate",
            "en-us-g2.ctb",
            5,
        );
        assert!(!engine.is_available());

        let engine = LiblouisEngine::new("lou_translate_not_on_path_anywhere", "en-us-g2.ctb", 5);
        assert!(!engine.is_available());
    }

    #[test]
    fn missing_table_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("lou_translate");
        std::fs::write(&program, b"").unwrap();
        let engine = LiblouisEngine::new(&program, dir.path().join("missing.ctb"), 5);
        assert!(!engine.is_available());

        let table = dir.path().join("en-us-g2.ctb");
        std::fs::write(&table, b"").unwrap();
        let engine = LiblouisEngine::new(&program, &table, 5);
        assert!(engine.is_available());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let engine = LiblouisEngine::new("/definitely/not/here/lou_translate", "t.ctb", 5);
        let err = engine.translate_contracted("abc").await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_exchange_trims_stdout() {
        // Stand-in engine that echoes stdin back and ignores the table argument.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_lou");
        std::fs::write(&script, "#!/bin/sh\ncat -\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = LiblouisEngine::new(&script, "table.ctb", 5);
        let out = engine.translate_uncontracted("  ⠓⠊  ").await.unwrap();
        assert_eq!(out, "⠓⠊");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_input_does_not_stall_on_full_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_lou");
        std::fs::write(&script, "#!/bin/sh\ncat -\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Far beyond a pipe buffer in both directions.
        let text = "braille ".repeat(40_000);
        let engine = LiblouisEngine::new(&script, "table.ctb", 10);
        let out = engine.translate_contracted(&text).await.unwrap();
        assert_eq!(out, text.trim());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("failing_lou");
        std::fs::write(&script, "#!/bin/sh\necho 'cannot open table' >&2\nexit 3\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = LiblouisEngine::new(&script, "table.ctb", 5);
        match engine.translate_contracted("abc").await.unwrap_err() {
            EngineError::Exit { stderr, .. } => assert_eq!(stderr, "cannot open table"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
