use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

use langie_ability::{
  AtlasProvider, AtlasRequest, CommonProvider, CommonRequest, KnowledgeBase, ProviderId,
  ResilientProvider, RuleAtlasProvider, RuleCommonProvider,
};
use langie_config::{EngineSettings, KnowledgeBaseDef, TicketDef};
use langie_engine::{Engine, EngineConfig, RunOutcome};
use langie_store::{CheckpointStore, MemoryStore, SqliteStore};
use langie_workflow::WorkflowRecord;

mod output;

use output::RunReport;

/// Langie - A support request workflow engine
#[derive(Parser)]
#[command(name = "langie")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.langie)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine settings file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Where checkpoints are kept
  #[arg(long, global = true, value_enum, default_value_t = StoreKind::Sqlite)]
  store: StoreKind,

  /// Print machine-readable JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
  Memory,
  Sqlite,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a support request through the workflow
  Run {
    /// Path to the ticket file (JSON); read from stdin if omitted
    ticket_file: Option<PathBuf>,

    /// Drop any stored run with the same id first
    #[arg(long)]
    replace: bool,

    /// Ask for the clarification reply on the terminal if the run suspends
    #[arg(long)]
    interactive: bool,

    /// Reply to use if the run suspends
    #[arg(long)]
    reply: Option<String>,
  },

  /// Resume a suspended run with the requester's reply
  Resume {
    run_id: String,

    /// The reply; read from stdin if omitted
    #[arg(long)]
    reply: Option<String>,
  },

  /// Show the stored checkpoint of a run
  Show { run_id: String },

  /// List stored runs
  List,

  /// Invoke a single ability with request fields read from stdin
  Invoke {
    /// common or atlas
    #[arg(long)]
    provider: ProviderId,

    #[arg(long)]
    ability: String,
  },
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("langie - use --help to see available commands");
    return Ok(());
  };

  let data_dir = match cli.data_dir.clone() {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".langie"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let settings = load_settings(cli.config.as_deref()).await?;
    let ctx = AppContext {
      settings,
      data_dir,
      store: cli.store,
      json: cli.json,
    };

    match command {
      Commands::Run {
        ticket_file,
        replace,
        interactive,
        reply,
      } => run(&ctx, ticket_file, replace, interactive, reply).await,
      Commands::Resume { run_id, reply } => resume(&ctx, &run_id, reply).await,
      Commands::Show { run_id } => show(&ctx, &run_id).await,
      Commands::List => list(&ctx).await,
      Commands::Invoke { provider, ability } => invoke(&ctx, provider, &ability).await,
    }
  })
}

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,langie=info"));
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(filter),
    )
    .init();
}

struct AppContext {
  settings: EngineSettings,
  data_dir: PathBuf,
  store: StoreKind,
  json: bool,
}

async fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
  let Some(path) = path else {
    return Ok(EngineSettings::default());
  };
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read settings file: {}", path.display()))?;
  EngineSettings::from_json(&content)
    .with_context(|| format!("failed to parse settings file: {}", path.display()))
}

async fn knowledge_base(settings: &EngineSettings) -> Result<KnowledgeBase> {
  let Some(path) = &settings.knowledge_base else {
    return Ok(KnowledgeBase::builtin());
  };
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read knowledge base: {}", path.display()))?;
  let def = KnowledgeBaseDef::from_json(&content)
    .with_context(|| format!("failed to parse knowledge base: {}", path.display()))?;
  let knowledge = KnowledgeBase::new(def);
  info!(path = %path.display(), articles = knowledge.len(), "knowledge base loaded");
  Ok(knowledge)
}

async fn providers(
  settings: &EngineSettings,
) -> Result<(Arc<dyn CommonProvider>, Arc<dyn AtlasProvider>)> {
  let policy = settings.provider.clone();
  let common = ResilientProvider::new(RuleCommonProvider::new(), policy.clone());
  let atlas = ResilientProvider::new(
    RuleAtlasProvider::new(knowledge_base(settings).await?),
    policy,
  );
  Ok((Arc::new(common), Arc::new(atlas)))
}

async fn open_store(ctx: &AppContext) -> Result<Arc<dyn CheckpointStore>> {
  match ctx.store {
    StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
    StoreKind::Sqlite => {
      tokio::fs::create_dir_all(&ctx.data_dir)
        .await
        .with_context(|| format!("failed to create data directory: {}", ctx.data_dir.display()))?;
      let path = ctx.data_dir.join("checkpoints.db");
      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open checkpoint store: {}", path.display()))?;
      Ok(Arc::new(store))
    }
  }
}

async fn build_engine(ctx: &AppContext) -> Result<Engine> {
  let (common, atlas) = providers(&ctx.settings).await?;
  let store = open_store(ctx).await?;
  Ok(Engine::new(
    EngineConfig::from(&ctx.settings),
    common,
    atlas,
    store,
  ))
}

async fn run(
  ctx: &AppContext,
  ticket_file: Option<PathBuf>,
  replace: bool,
  interactive: bool,
  reply: Option<String>,
) -> Result<()> {
  let content = match &ticket_file {
    Some(path) => tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("failed to read ticket file: {}", path.display()))?,
    None => read_stdin().context("failed to read ticket from stdin")?,
  };
  let ticket = TicketDef::from_json(&content).context("failed to parse ticket")?;

  let engine = build_engine(ctx).await?;
  if replace && engine.delete(&ticket.run_id).await? {
    info!(run_id = %ticket.run_id, "replaced stored run");
  }

  let mut outcome = engine.start(&ticket).await.context("workflow run failed")?;

  if let RunOutcome::Suspended(record) = &outcome {
    let reply = match reply {
      Some(reply) => Some(reply),
      None if interactive && io::stdin().is_terminal() => Some(ask(record)?),
      None => None,
    };
    if let Some(reply) = reply.filter(|r| !r.trim().is_empty()) {
      let run_id = record.run_id.clone();
      outcome = engine
        .resume(&run_id, &reply)
        .await
        .context("failed to resume run")?;
    }
  }

  print_outcome(ctx, &outcome)
}

async fn resume(ctx: &AppContext, run_id: &str, reply: Option<String>) -> Result<()> {
  let reply = match reply {
    Some(reply) => reply,
    None => read_stdin().context("failed to read reply from stdin")?,
  };

  let engine = build_engine(ctx).await?;
  let outcome = engine
    .resume(run_id, reply.trim())
    .await
    .with_context(|| format!("failed to resume run '{run_id}'"))?;

  print_outcome(ctx, &outcome)
}

async fn show(ctx: &AppContext, run_id: &str) -> Result<()> {
  let engine = build_engine(ctx).await?;
  let checkpoint = engine
    .inspect(run_id)
    .await
    .with_context(|| format!("failed to load run '{run_id}'"))?;

  if ctx.json {
    println!("{}", serde_json::to_string_pretty(&checkpoint)?);
    return Ok(());
  }

  let next = checkpoint
    .next_stage
    .map(|s| s.to_string())
    .unwrap_or_else(|| "-".to_string());
  println!("run:       {}", checkpoint.run_id);
  println!("revision:  {}", checkpoint.revision);
  println!("updated:   {}", checkpoint.updated_at);
  println!("next:      {next}");
  if let Some(path) = checkpoint
    .next_stage
    .and_then(|stage| engine.graph().path_from(stage, checkpoint.record.route).ok())
  {
    let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
    println!("remaining: {}", path.join(" -> "));
  }
  print_record(&checkpoint.record);
  Ok(())
}

async fn list(ctx: &AppContext) -> Result<()> {
  let engine = build_engine(ctx).await?;
  let runs = engine.list().await.context("failed to list runs")?;

  if ctx.json {
    println!("{}", serde_json::to_string_pretty(&runs)?);
    return Ok(());
  }

  if runs.is_empty() {
    println!("no stored runs");
    return Ok(());
  }
  for run in runs {
    let next = run
      .next_stage
      .map(|s| s.to_string())
      .unwrap_or_else(|| "-".to_string());
    println!(
      "{:<24} {:<16} next={:<16} rev={:<4} {}",
      run.run_id,
      run.run_status.as_str(),
      next,
      run.revision,
      run.updated_at
    );
  }
  Ok(())
}

async fn invoke(ctx: &AppContext, provider: ProviderId, ability: &str) -> Result<()> {
  let fields = read_fields_from_stdin()?;
  let (common, atlas) = providers(&ctx.settings).await?;

  let response = match provider {
    ProviderId::Common => {
      let request = CommonRequest::from_parts(ability, fields)?;
      serde_json::to_value(common.invoke(request).await?)?
    }
    ProviderId::Atlas => {
      let request = AtlasRequest::from_parts(ability, fields)?;
      serde_json::to_value(atlas.invoke(request).await?)?
    }
  };

  println!("{}", serde_json::to_string_pretty(&response)?);
  Ok(())
}

fn print_outcome(ctx: &AppContext, outcome: &RunOutcome) -> Result<()> {
  let record = outcome.record();

  if ctx.json {
    println!("{}", serde_json::to_string_pretty(&RunReport::new(record))?);
    return Ok(());
  }

  print_record(record);
  if outcome.is_suspended() {
    println!();
    println!("Clarification needed: {}", record.clarification_prompt);
    println!(
      "Resume with: langie resume {} --reply \"<answer>\"",
      record.run_id
    );
  }
  Ok(())
}

fn print_record(record: &WorkflowRecord) {
  let route = record
    .route
    .map(|r| r.to_string())
    .unwrap_or_else(|| "-".to_string());
  println!("run_id:    {}", record.run_id);
  println!("requester: {} <{}>", record.requester_name, record.requester_contact);
  println!("query:     {}", record.query_text);
  println!("priority:  {}", record.priority);
  println!("score:     {}", record.confidence_score);
  println!("route:     {route}");
  println!("status:    {}", record.run_status);
  if !record.resolution_summary.is_empty() {
    println!("response:  {}", record.resolution_summary);
  }

  println!();
  println!("Audit trail:");
  for entry in record.audit_trail.iter() {
    println!(
      "- {} [{:?}] {} via {}",
      entry.stage,
      entry.status,
      entry.abilities.join(", "),
      entry.providers.join(", ")
    );
  }
}

/// Show the clarification prompt and read one line from the terminal.
fn ask(record: &WorkflowRecord) -> Result<String> {
  let prompt = match record.clarification_prompt.trim() {
    "" => "Please provide more details to proceed.",
    prompt => prompt,
  };
  eprintln!("\nClarification needed:\n{prompt}");
  eprint!("\nYour reply: ");
  io::stderr().flush()?;

  let mut line = String::new();
  io::stdin()
    .lock()
    .read_line(&mut line)
    .context("failed to read reply")?;
  Ok(line.trim().to_string())
}

fn read_stdin() -> Result<String> {
  if io::stdin().is_terminal() {
    bail!("nothing on stdin; pass a file or pipe input in");
  }
  let mut input = String::new();
  io::stdin().read_to_string(&mut input)?;
  Ok(input)
}

fn read_fields_from_stdin() -> Result<serde_json::Value> {
  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read request fields from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse request fields JSON from stdin")
  }
}
