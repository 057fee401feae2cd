// Command Line Front End
// Argument parsing and command dispatch; every command prints JSON to stdout.

use crate::api::{AnalysisService, ApiError, ApiResponse};
use crate::models::{ContentType, Submission, UploadedFile};
use crate::services::config_store::{AppConfig, ConfigStore};
use crate::services::result_store::{FileStore, MemoryStore, ResultStore};
use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const USAGE: &str = "Usage:
  naijaverify analyze <text|url|image|video> <content-or-file> [options]
  naijaverify results <id>
  naijaverify list
  naijaverify mock <id>
  naijaverify score <text>
  naijaverify source <url>
  naijaverify config show
  naijaverify config set-provider <name[:model]>
  naijaverify config set-key <provider> <key>
  naijaverify config delete-key <provider>
  naijaverify config set-url <provider> <url>

Options:
  --provider <name[:model]>  Override the configured provider for this run
  --timeout <secs>           Per-attempt LLM timeout
  --attempts <n>             Total LLM attempts
  --data-dir <path>          Directory holding results.json
  --memory                   Keep results in memory only
  --                         Treat everything after it as content";

const VALUED_OPTIONS: [&str; 4] = ["--provider", "--timeout", "--attempts", "--data-dir"];
const FLAG_OPTIONS: [&str; 1] = ["--memory"];

/// Arguments before a literal `--`; everything after it is content.
fn option_args(args: &[String]) -> &[String] {
    match args.iter().position(|a| a == "--") {
        Some(i) => &args[..i],
        None => args,
    }
}

pub fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    let args = option_args(args);
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

pub fn has_flag(args: &[String], key: &str) -> bool {
    option_args(args).iter().any(|a| a == key)
}

/// Positional arguments, with known options and their values skipped.
/// Unknown `--words` stay positional, and a literal `--` ends option parsing.
fn positionals(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            out.extend(iter.cloned());
            break;
        }
        if VALUED_OPTIONS.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if FLAG_OPTIONS.contains(&arg.as_str()) {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the envelope and map it to a process exit code.
fn respond<T: Serialize>(result: Result<T, ApiError>) -> anyhow::Result<i32> {
    let response: ApiResponse<T> = result.into();
    let code = if response.success { 0 } else { 1 };
    print_json(&response)?;
    Ok(code)
}

fn config_store() -> anyhow::Result<ConfigStore> {
    let dir = ConfigStore::default_config_dir().ok_or_else(|| anyhow!("Cannot determine config directory"))?;
    Ok(ConfigStore::new(dir))
}

fn apply_overrides(config: &mut AppConfig, args: &[String]) -> anyhow::Result<()> {
    if let Some(provider) = parse_arg_value(args, "--provider") {
        config.default_provider = Some(provider);
    }
    if let Some(secs) = parse_arg_value(args, "--timeout") {
        config.llm.timeout_secs = secs.parse().with_context(|| format!("invalid --timeout '{}'", secs))?;
    }
    if let Some(n) = parse_arg_value(args, "--attempts") {
        config.llm.max_attempts = n.parse().with_context(|| format!("invalid --attempts '{}'", n))?;
    }
    Ok(())
}

fn result_store(config: &AppConfig, args: &[String]) -> anyhow::Result<Arc<dyn ResultStore>> {
    if has_flag(args, "--memory") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let dir = parse_arg_value(args, "--data-dir")
        .or_else(|| config.storage.dir.clone())
        .map(PathBuf::from)
        .or_else(FileStore::default_data_dir)
        .ok_or_else(|| anyhow!("Cannot determine data directory"))?;
    let store = FileStore::new(dir);
    info!("Result store: {}", store.path().display());
    Ok(Arc::new(store))
}

fn build_service(args: &[String]) -> anyhow::Result<AnalysisService> {
    let store = config_store()?;
    let mut config = store.load().map_err(|e| anyhow!(e))?;
    apply_overrides(&mut config, args)?;
    let results = result_store(&config, args)?;
    AnalysisService::from_config(&config, Some(&store), results)
}

fn submission_from(kind: &str, content: &str) -> anyhow::Result<Submission> {
    let content_type = ContentType::parse(kind).ok_or_else(|| anyhow!("unknown content type '{}'", kind))?;
    if !content_type.is_file_based() {
        return Ok(Submission {
            content_type,
            content: Some(content.to_string()),
            file: None,
        });
    }

    let file = if content.is_empty() {
        None
    } else {
        let path = std::path::Path::new(content);
        let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| content.to_string());
        Some(UploadedFile { name, size_bytes })
    };
    Ok(Submission {
        content_type,
        content: None,
        file,
    })
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    warn!("Interrupted, cancelling analysis");
}

/// Run one command; returns the process exit code.
pub async fn execute(args: &[String]) -> anyhow::Result<i32> {
    let pos = positionals(args);
    let command = match pos.first() {
        Some(c) => c.as_str(),
        None => {
            eprintln!("{}", USAGE);
            return Ok(2);
        }
    };
    let arg = |i: usize| pos.get(i).cloned().unwrap_or_default();

    match command {
        "analyze" => {
            let kind = arg(1);
            if kind.is_empty() {
                bail!("missing content type\n\n{}", USAGE);
            }
            // Text may be passed unquoted as several words.
            let content = pos.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            let submission = submission_from(&kind, &content)?;
            let service = build_service(args)?;
            respond(service.submit_until(submission, ctrl_c()).await)
        }
        "results" => respond(build_service(args)?.get_results(&arg(1))),
        "list" => respond(build_service(args)?.list_results()),
        "mock" => {
            let id = arg(1);
            if id.is_empty() {
                bail!("missing analysis id");
            }
            respond(Ok(build_service(args)?.mock_results(&id)))
        }
        "score" => {
            let text = pos.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
            respond(Ok(build_service(args)?.score_text(&text)))
        }
        "source" => respond(Ok(build_service(args)?.check_source(&arg(1)))),
        "config" => run_config(&pos[1..]),
        "help" => {
            println!("{}", USAGE);
            Ok(0)
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn nth(pos: &[String], i: usize) -> anyhow::Result<&str> {
    pos.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument\n\n{}", USAGE))
}

fn run_config(pos: &[String]) -> anyhow::Result<i32> {
    let store = config_store()?;
    let arg = |i: usize| nth(pos, i);

    match pos.first().map(String::as_str).unwrap_or("show") {
        "show" => {
            let mut config = store.load().map_err(|e| anyhow!(e))?;
            // Never echo secrets.
            for key in config.api_keys.values_mut() {
                *key = "********".to_string();
            }
            print_json(&config)?;
        }
        "set-provider" => store.set_default_provider(arg(1)?).map_err(|e| anyhow!(e))?,
        "set-key" => store.set_api_key(arg(1)?, arg(2)?).map_err(|e| anyhow!(e))?,
        "delete-key" => store.delete_api_key(arg(1)?).map_err(|e| anyhow!(e))?,
        "set-url" => store.set_provider_url(arg(1)?, arg(2)?).map_err(|e| anyhow!(e))?,
        other => bail!("unknown config command '{}'", other),
    }
    Ok(0)
}
