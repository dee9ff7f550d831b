use secrecy::{ExposeSecret, SecretString};

use crate::error::ExecError;

/// Abstraction over container CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Execute `program` with extra environment and data piped to stdin,
    /// capturing stdout.
    async fn exec(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, SecretString)],
        stdin_data: &[u8],
    ) -> Result<String, ExecError>;
}

/// Runs commands as child processes.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn exec(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, SecretString)],
        stdin_data: &[u8],
    ) -> Result<String, ExecError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k, v.expose_secret())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let stdin_error = |e| ExecError::StdinWrite {
                program: program.to_owned(),
                source: e,
            };
            stdin.write_all(stdin_data).await.map_err(stdin_error)?;
            stdin.shutdown().await.map_err(stdin_error)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: program.to_owned(),
                source: e,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(ExecError::CommandFailed {
                program: program.to_owned(),
                args: args.to_vec(),
                stderr,
            })
        }
    }
}
