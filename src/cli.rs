// CLI module - command-line argument parsing and handlers
//
// Every command except `config` runs against a fully wired AppContext whose
// session has already been bootstrapped. Results go to stdout; logs and
// prompts go to stderr.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::config::{Config, VERSION};
use crate::error::{ApiError, BestEffort};
use crate::models::{
    DefectRecord, DefectStatus, ListFilter, NewComment, NewDefect, NewProject, Priority,
    RegisterRequest,
};
use crate::stores::DefectSummary;
use crate::transport::UploadFile;

/// defectdesk - command-line client for the defect tracker
#[derive(Parser, Debug)]
#[command(name = "defectdesk")]
#[command(version = VERSION)]
#[command(about = "Command-line client for the defect tracker", long_about = None)]
pub struct Cli {
    /// API base URL (overrides config file and environment)
    #[arg(long, global = true)]
    pub api: Option<String>,

    /// Keep the session in memory only; nothing is written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        email: String,
        #[arg(long)]
        full_name: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Exchange the refresh token for a new session
    Refresh,

    /// Show the signed-in user
    Whoami,

    /// Change the password of the signed-in user
    Password {
        #[arg(long)]
        current: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },

    /// Work with projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },

    /// Work with defects
    Defects {
        #[command(subcommand)]
        command: DefectsCommand,
    },

    /// Check that the API is reachable
    Ping,

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List projects
    List,
    /// Create a project
    Create {
        name: String,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DefectsCommand {
    /// List defects
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        /// Extra query parameter, repeatable
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Create a defect
    Create {
        #[arg(long)]
        project: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// LOW, MEDIUM, HIGH, CRITICAL
        #[arg(long, default_value = "MEDIUM")]
        priority: String,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Show one defect with its attachments and comments
    Show { id: String },
    /// List the comments of a defect
    Comments { id: String },
    /// Add a comment
    Comment { id: String, body: String },
    /// Upload a file to a defect
    Attach { id: String, file: PathBuf },
    /// Change the status of a defect
    Status { id: String, status: String },
    /// Download an attachment
    Download {
        id: String,
        attachment_id: String,
        /// Defaults to the attachment's file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    if key.is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Attach the store's user-facing message to an API error
fn described(err: ApiError, message: Option<String>) -> anyhow::Error {
    match message {
        Some(message) => anyhow::Error::new(err).context(message),
        None => err.into(),
    }
}

/// Read one line from stdin after printing `prompt` to stderr
fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("failed to read from stdin")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn secret(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt_line(prompt),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

pub async fn run(app: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let password = secret(password, "Password: ")?;
            app.session
                .login(&email, &password)
                .await
                .map_err(|e| described(e, app.session.error()))?;
            print_whoami(app);
        }
        Commands::Register {
            email,
            full_name,
            password,
            role,
        } => {
            let password = secret(password, "Password: ")?;
            let request = RegisterRequest {
                email,
                full_name,
                password,
                role,
            };
            app.session
                .register(&request)
                .await
                .map_err(|e| described(e, app.session.error()))?;
            print_whoami(app);
        }
        Commands::Logout => match app.sign_out().await {
            BestEffort::Failed(e) => println!("Signed out locally (server said: {})", e),
            BestEffort::Completed | BestEffort::Skipped => println!("Signed out"),
        },
        Commands::Refresh => {
            app.session.refresh().await?;
            println!("Session refreshed");
        }
        Commands::Whoami => print_whoami(app),
        Commands::Password { current, new } => {
            require_session(app)?;
            let current = secret(current, "Current password: ")?;
            let new = secret(new, "New password: ")?;
            app.session.change_password(&current, &new).await?;
            println!("Password changed");
        }
        Commands::Projects { command } => run_projects(app, command).await?,
        Commands::Defects { command } => run_defects(app, command).await?,
        Commands::Ping => {
            app.transport.ping().await?;
            println!("{} is reachable", app.transport.base_url());
        }
        Commands::Config { .. } => {
            bail!("config commands are handled before the client starts")
        }
    }
    Ok(())
}

fn require_session(app: &AppContext) -> Result<()> {
    if app.session.is_authenticated() {
        Ok(())
    } else {
        Err(anyhow!("not signed in; run `defectdesk login <email>` first"))
    }
}

fn print_whoami(app: &AppContext) {
    let state = app.session.snapshot();
    if !state.is_authenticated() {
        println!("Not signed in");
        return;
    }
    match state.user {
        Some(user) => println!("{} <{}> ({})", user.full_name, user.email, user.role),
        None => println!("Signed in"),
    }
}

async fn run_projects(app: &AppContext, command: ProjectsCommand) -> Result<()> {
    match command {
        ProjectsCommand::List => {
            app.projects
                .fetch(&ListFilter::new())
                .await
                .map_err(|e| described(e, app.projects.error()))?;
            for project in app.projects.items() {
                println!(
                    "{}\t{}\t{}",
                    project.id,
                    project.stage.as_deref().unwrap_or("-"),
                    project.name
                );
            }
        }
        ProjectsCommand::Create {
            name,
            stage,
            description,
            start,
            end,
        } => {
            let payload = NewProject {
                name,
                stage,
                description,
                start_date: start,
                end_date: end,
            };
            let project = app
                .projects
                .create(&payload)
                .await
                .map_err(|e| described(e, app.projects.error()))?;
            println!("Created project {} ({})", project.name, project.id);
        }
    }
    Ok(())
}

fn print_defect_line(defect: &DefectRecord) {
    println!(
        "{}\t{}\t{}\t{}",
        defect.id, defect.status, defect.priority, defect.title
    );
}

fn print_summary(summary: DefectSummary) {
    println!(
        "total: {}  critical: {}  in progress: {}",
        summary.total, summary.critical, summary.in_progress
    );
}

async fn run_defects(app: &AppContext, command: DefectsCommand) -> Result<()> {
    let defects = &app.defects;
    match command {
        DefectsCommand::List {
            status,
            priority,
            project,
            limit,
            params,
        } => {
            let mut filter = ListFilter::new();
            if let Some(status) = status {
                filter = filter.status(status.to_uppercase().as_str());
            }
            if let Some(priority) = priority {
                filter = filter.priority(priority.to_uppercase().as_str());
            }
            if let Some(project) = project {
                filter = filter.project(project);
            }
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }
            for (key, value) in params {
                filter = filter.with(key, value);
            }

            defects
                .fetch(&filter)
                .await
                .map_err(|e| described(e, defects.error()))?;
            for defect in defects.items() {
                print_defect_line(&defect);
            }
            print_summary(defects.summary());
        }
        DefectsCommand::Create {
            project,
            title,
            description,
            priority,
            severity,
            assignee,
            due,
        } => {
            let payload = NewDefect {
                project_id: project,
                title,
                description,
                priority: Priority::from(priority.to_uppercase()),
                severity,
                assignee_id: assignee,
                due_date: due,
            };
            let defect = defects
                .create(&payload)
                .await
                .map_err(|e| described(e, defects.error()))?;
            println!("Created defect {}", defect.id);
        }
        DefectsCommand::Show { id } => {
            let defect = defects
                .fetch_one(&id)
                .await
                .map_err(|e| described(e, defects.error()))?;
            print_defect_line(&defect);
            if let Some(project) = &defect.project {
                println!("project: {}", project);
            }
            if let Some(assignee) = &defect.assignee {
                println!("assignee: {}", assignee);
            }
            if let Some(due) = defect.due_date {
                println!("due: {}", due);
            }
            if let Some(description) = &defect.description {
                println!();
                println!("{}", description);
            }
            if !defect.attachments.is_empty() {
                println!();
                println!("attachments:");
                for attachment in &defect.attachments {
                    println!("  {}\t{}", attachment.id, attachment.filename);
                }
            }
            print_comments(&defects.comments());
        }
        DefectsCommand::Comments { id } => {
            let comments = defects
                .fetch_comments(&id)
                .await
                .map_err(|e| described(e, defects.error()))?;
            print_comments(&comments);
        }
        DefectsCommand::Comment { id, body } => {
            let comment = defects
                .add_comment(&id, &NewComment::new(body))
                .await
                .map_err(|e| described(e, defects.error()))?;
            println!("Added comment {}", comment.id);
        }
        DefectsCommand::Attach { id, file } => {
            let upload = UploadFile::from_path(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let attachment = defects
                .add_attachment(&id, upload)
                .await
                .map_err(|e| described(e, defects.error()))?;
            println!("Uploaded {} as {}", attachment.filename, attachment.id);
        }
        DefectsCommand::Status { id, status } => {
            let defect = defects
                .update_status(&id, DefectStatus::from(status.to_uppercase()))
                .await
                .map_err(|e| described(e, defects.error()))?;
            print_defect_line(&defect);
        }
        DefectsCommand::Download {
            id,
            attachment_id,
            output,
        } => {
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(attachment_filename(app, &id, &attachment_id).await),
            };
            let bytes = defects.download_attachment(&id, &attachment_id).await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("Saved {} bytes to {}", bytes.len(), output.display());
        }
    }
    Ok(())
}

/// File name the server knows the attachment by, or its id
async fn attachment_filename(app: &AppContext, defect_id: &str, attachment_id: &str) -> String {
    let name = match app.defects.fetch_one(defect_id).await {
        Ok(defect) => defect
            .attachments
            .into_iter()
            .find(|a| a.id == attachment_id)
            .map(|a| a.filename),
        Err(e) => {
            tracing::debug!("Could not look up attachment name: {}", e);
            None
        }
    };
    // Only the final path component; never let a server name escape the cwd
    name.as_deref()
        .and_then(|n| std::path::Path::new(n).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| attachment_id.to_string())
}

fn print_comments(comments: &[crate::models::CommentRecord]) {
    if comments.is_empty() {
        return;
    }
    println!();
    println!("comments:");
    for comment in comments {
        let when = comment
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let author = if comment.author.is_empty() {
            "-"
        } else {
            comment.author.as_str()
        };
        println!("  [{}] {}: {}", when, author, comment.body);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config subcommand
// ─────────────────────────────────────────────────────────────────────────────

/// Handle `config`; runs before logging and the client are set up
pub fn handle_config(show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        handle_config_path()
    } else if show {
        handle_config_show()
    } else if reset {
        handle_config_reset()
    } else {
        println!("Usage: defectdesk config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
        Ok(())
    }
}

fn handle_config_path() -> Result<()> {
    let path = Config::config_path().context("could not determine config path")?;
    println!("{}", path.display());
    Ok(())
}

fn handle_config_show() -> Result<()> {
    let config = Config::from_env()?;

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
    Ok(())
}

fn handle_config_reset() -> Result<()> {
    let path = Config::config_path().context("could not determine config path")?;

    if path.exists() {
        let answer = prompt_line(&format!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        ))?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    Config::default()
        .save()
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("severity=major"),
            Ok(("severity".to_string(), "major".to_string()))
        );
        assert_eq!(
            parse_key_val("q=a=b"),
            Ok(("q".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "defectdesk",
            "defects",
            "list",
            "--status",
            "open",
            "--param",
            "assigneeId=u7",
            "--ephemeral",
        ])
        .unwrap();
        assert!(cli.ephemeral);
        match cli.command {
            Commands::Defects {
                command: DefectsCommand::List { status, params, .. },
            } => {
                assert_eq!(status.as_deref(), Some("open"));
                assert_eq!(params, vec![("assigneeId".to_string(), "u7".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_dates_are_parsed() {
        let cli = Cli::try_parse_from([
            "defectdesk",
            "projects",
            "create",
            "Depot",
            "--start",
            "2025-04-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Projects {
                command: ProjectsCommand::Create { start, .. },
            } => assert_eq!(start, NaiveDate::from_ymd_opt(2025, 4, 1)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_described_prefers_store_message() {
        let err = ApiError::Network("connection refused".to_string());
        let described = described(err, Some("Could not load the defect list".to_string()));
        assert_eq!(described.to_string(), "Could not load the defect list");
        assert!(format!("{:#}", described).contains("connection refused"));
    }
}
