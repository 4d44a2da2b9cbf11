//! `finmart` — command-line client for the finmart intake server.
//!
//! # Usage
//!
//! ```
//! finmart submit contact '{"name":"Asha","message":"hello"}'
//! finmart applications --as user-123
//! finmart --user admin --password secret list loan_applications --status pending
//! finmart --config ~/.config/finmart/config.toml promote loan_applications <id>
//! ```

mod client;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "finmart", about = "Command-line client for the finmart intake server")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the finmart server (default: http://localhost:8080).
  #[arg(long, env = "FINMART_URL")]
  url: Option<String>,

  /// Admin username.
  #[arg(long, env = "FINMART_USER")]
  user: Option<String>,

  /// Admin password (plaintext).
  #[arg(long, env = "FINMART_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Submit a form of the given kind, e.g. `user-loan`.
  Submit {
    kind:  String,
    /// Form data as a JSON object.
    form:  String,
    /// Submit as this signed-in user.
    #[arg(long = "as", value_name = "USER_ID")]
    as_user: Option<String>,
  },
  /// Show a user's merged pending and approved applications.
  Applications {
    #[arg(long = "as", value_name = "USER_ID")]
    as_user: String,
  },
  /// List a collection, newest first.
  List {
    collection: String,
    #[arg(long)]
    status:     Option<String>,
  },
  /// Set the status of a record.
  Status {
    collection: String,
    id:         Uuid,
    status:     String,
  },
  /// Approve a user application and copy it into the approved store.
  Promote {
    collection: String,
    id:         Uuid,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

/// CLI flags override config file, which overrides defaults.
fn resolve(args: &Args, file_cfg: &ConfigFile) -> ApiConfig {
  let pick = |flag: &Option<String>, file: &str| {
    flag
      .clone()
      .or_else(|| (!file.is_empty()).then(|| file.to_string()))
  };
  ApiConfig {
    base_url: pick(&args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: pick(&args.user, &file_cfg.username).unwrap_or_default(),
    password: pick(&args.password, &file_cfg.password).unwrap_or_default(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(resolve(&args, &file_cfg))?;

  match args.command {
    Command::Submit { kind, form, as_user } => {
      let form: serde_json::Value =
        serde_json::from_str(&form).context("form must be valid JSON")?;
      let receipt = client.submit(&kind, &form, as_user.as_deref()).await?;
      println!("{} {}", receipt.collection, receipt.id);
    }
    Command::Applications { as_user } => {
      let result = client.applications(&as_user).await?;
      print!("{}", output::applications_table(&result.applications));
      if result.partial {
        eprintln!("warning: some applications could not be loaded");
      }
    }
    Command::List { collection, status } => {
      let docs = client.list(&collection, status.as_deref()).await?;
      print!("{}", output::documents_table(&docs));
    }
    Command::Status { collection, id, status } => {
      let doc = client.set_status(&collection, id, &status).await?;
      println!("{} {} → {}", collection, doc.id, doc.status);
    }
    Command::Promote { collection, id } => {
      let doc = client.promote(&collection, id).await?;
      println!("{collection} {id} promoted as {}", doc.id);
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("finmart").chain(argv.iter().copied())).unwrap()
  }

  #[test]
  fn flags_override_file_values() {
    let file: ConfigFile = toml::from_str(
      r#"
        url = "http://file:1"
        username = "file-user"
        password = "file-pass"
      "#,
    )
    .unwrap();
    let cfg = resolve(
      &args(&["--url", "http://flag:2", "list", "admin_loans"]),
      &file,
    );
    assert_eq!(cfg.base_url, "http://flag:2");
    assert_eq!(cfg.username, "file-user");
    assert_eq!(cfg.password, "file-pass");
  }

  #[test]
  fn defaults_apply_when_nothing_is_set() {
    let cfg = resolve(&args(&["list", "admin_loans"]), &ConfigFile::default());
    assert_eq!(cfg.base_url, "http://localhost:8080");
    assert!(cfg.username.is_empty());
  }

  #[test]
  fn submit_parses_the_as_flag() {
    let parsed = args(&["submit", "user-loan", "{}", "--as", "u1"]);
    assert!(matches!(
      parsed.command,
      Command::Submit { ref kind, ref as_user, .. }
        if kind == "user-loan" && as_user.as_deref() == Some("u1")
    ));
  }
}
