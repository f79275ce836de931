//! Command-line surface and command dispatch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use vault_core::biometric::{Capture, FaceDescriptor};
use vault_core::store::{ObjectStore, RecordStore};
use vault_core::{Credential, FileProtector, FileRecord, Protection, ProtectionError};

#[derive(Debug, Parser)]
#[command(name = "filevault")]
#[command(version)]
#[command(about = "Client-side file protection backed by S3")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encrypt a local file and upload it
    Protect {
        /// File to protect
        input: PathBuf,

        /// Record id
        #[arg(long)]
        id: String,

        /// Owning user
        #[arg(long, default_value = "local")]
        owner: String,

        /// Environment variable holding the password (password-derived key)
        #[arg(long, value_name = "VAR", conflicts_with = "plain")]
        password_env: Option<String>,

        /// Upload without encryption
        #[arg(long)]
        plain: bool,
    },

    /// Download and decrypt a file
    Unlock {
        /// Record id
        #[arg(long)]
        id: String,

        /// Where to write the plaintext
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        credential: CredentialArgs,
    },

    /// Re-encrypt a password-protected file under a new password
    ResetPassword {
        /// Record id
        #[arg(long)]
        id: String,

        /// Environment variable holding the current password
        #[arg(long, value_name = "VAR")]
        old_password_env: String,

        /// Environment variable holding the new password
        #[arg(long, value_name = "VAR")]
        new_password_env: String,
    },

    /// Enrol a face descriptor for a file
    EnrollFace {
        /// Record id
        #[arg(long)]
        id: String,

        /// JSON array of descriptor values
        #[arg(long)]
        face: PathBuf,
    },

    /// Remove the enrolled face of a file
    ClearFace {
        /// Record id
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct CredentialArgs {
    /// Environment variable holding the password
    #[arg(long, value_name = "VAR", conflicts_with = "face")]
    password_env: Option<String>,

    /// JSON array of descriptor values from a live capture
    #[arg(long)]
    face: Option<PathBuf>,

    /// Unlock with the face capture; without it only a preview match is reported
    #[arg(long, requires = "face")]
    confirm: bool,
}

/// Execute one parsed command against `protector`.
pub async fn run<O, R>(protector: &FileProtector<O, R>, command: Command) -> Result<()>
where
    O: ObjectStore,
    R: RecordStore,
{
    match command {
        Command::Protect {
            input,
            id,
            owner,
            password_env,
            plain,
        } => {
            let plaintext = tokio::fs::read(&input)
                .await
                .with_context(|| format!("failed to read {}", input.display()))?;
            let password = password_env.as_deref().map(read_secret).transpose()?;
            let protection = match (&password, plain) {
                (Some(pw), _) => Protection::Password(pw),
                (None, true) => Protection::None,
                (None, false) => Protection::RandomKey,
            };
            let record = FileRecord {
                storage_path: format!("{owner}/{id}"),
                name: file_name(&input),
                owner_id: owner,
                id,
                ..Default::default()
            };
            let record = protector
                .protect(record, &plaintext, protection)
                .await
                .context("protect failed")?;
            println!("protected {} as {}", input.display(), record.id);
        }

        Command::Unlock {
            id,
            out,
            credential,
        } => {
            let password = credential
                .password_env
                .as_deref()
                .map(read_secret)
                .transpose()?;
            let capture = match &credential.face {
                Some(path) => Some(Capture::new(read_face(path).await?)),
                None => None,
            };

            let plaintext = match (password.as_deref(), capture) {
                (Some(pw), _) => protector.unlock(&id, Credential::Password(pw)).await,
                (None, Some(capture)) if credential.confirm => {
                    let confirmed = capture.confirm();
                    protector.unlock(&id, Credential::Face(&confirmed)).await
                }
                (None, Some(capture)) => {
                    let matched = protector
                        .preview_face(&id, &capture)
                        .await
                        .context("face preview failed")?;
                    println!(
                        "preview: face {}; re-run with --confirm to unlock",
                        if matched { "matches" } else { "does not match" }
                    );
                    return Ok(());
                }
                (None, None) => protector.unlock(&id, Credential::None).await,
            };
            let plaintext = plaintext.map_err(explain)?;

            tokio::fs::write(&out, &plaintext)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(file_id = %id, bytes = plaintext.len(), "plaintext written");
            println!("unlocked {id} to {}", out.display());
        }

        Command::ResetPassword {
            id,
            old_password_env,
            new_password_env,
        } => {
            let old = read_secret(&old_password_env)?;
            let new = read_secret(&new_password_env)?;
            protector
                .reset_password(&id, &old, &new)
                .await
                .map_err(explain)?;
            println!("password reset for {id}");
        }

        Command::EnrollFace { id, face } => {
            let descriptor = read_face(&face).await?;
            protector
                .enroll_face(&id, descriptor)
                .await
                .context("face enrolment failed")?;
            println!("face enrolled for {id}");
        }

        Command::ClearFace { id } => {
            protector
                .clear_face(&id)
                .await
                .context("clearing face failed")?;
            println!("face cleared for {id}");
        }
    }
    Ok(())
}

/// Lead with the user-facing text, keep the full error chain underneath.
fn explain(e: ProtectionError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn read_secret(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("environment variable {var} is not set"))
}

async fn read_face(path: &Path) -> Result<FaceDescriptor> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a valid face descriptor", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_owned()
}
