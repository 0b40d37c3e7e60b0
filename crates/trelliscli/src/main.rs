use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use trelliscore::{
    validate, DefinitionCatalog, ExecutionEvent, GuardFallback, LogStatus, Node, NodeMessage, Payload,
    TriggerType, Workflow, WorkflowStatus,
};
use trellisruntime::{ActionRegistry, AutomationService, EngineConfig, InMemoryStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Workflow automation engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Trigger payload as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show debug output
        #[arg(short, long)]
        verbose: bool,

        /// Treat guard conditions without an operator as false
        #[arg(long)]
        block_malformed_guards: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available trigger and action types
    Actions,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            block_malformed_guards,
        } => {
            init_tracing(verbose);
            let fallback = if block_malformed_guards {
                GuardFallback::Block
            } else {
                GuardFallback::Allow
            };
            run_workflow(file, input, fallback).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Actions => {
            list_actions();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &PathBuf) -> Result<Workflow> {
    let workflow_json =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(workflow)
}

fn parse_input(input: Option<String>) -> Result<Payload> {
    let Some(input) = input else {
        return Ok(Payload::new());
    };
    match serde_json::from_str(&input)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("Input must be a JSON object"),
    }
}

async fn run_workflow(file: PathBuf, input: Option<String>, guard_fallback: GuardFallback) -> Result<()> {
    println!("Loading workflow from: {}", file.display());

    let mut workflow = load_workflow(&file)?;
    let trigger_data = parse_input(input)?;

    println!("Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let mut registry = ActionRegistry::new();
    let builtins = trellisactions::register_all(&mut registry);
    let mut catalog = DefinitionCatalog::new();
    trellisactions::register_definitions(&mut catalog);

    let service = AutomationService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(registry),
        Arc::new(catalog),
        EngineConfig {
            guard_fallback,
            ..EngineConfig::default()
        },
    );

    workflow.status = WorkflowStatus::Active;
    let workflow = service.create_workflow(workflow).await?;

    let mut events = service.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::ExecutionStarted { execution_id, .. } => {
                    println!("Execution {} started", execution_id);
                }
                ExecutionEvent::NodeStarted { node_name, node_type, .. } => {
                    println!("  > {} ({})", node_name, node_type);
                }
                ExecutionEvent::NodeCompleted { node_id, duration_ms, .. } => {
                    println!("    completed {} in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("    FAILED {}: {}", node_id, error);
                }
                ExecutionEvent::NodeSkipped { node_id, reason, .. } => {
                    println!("    skipped {}: {}", node_id, reason);
                }
                ExecutionEvent::NodeMessage { message, .. } => match message {
                    NodeMessage::Info { message } => println!("      {}", message),
                    NodeMessage::Warning { message } => println!("      warning: {}", message),
                },
                ExecutionEvent::ExecutionFinished { status, duration_ms, .. } => {
                    println!("Execution finished {:?} in {}ms", status, duration_ms);
                    break;
                }
            }
        }
    });

    let execution = service
        .execute_workflow(workflow.id, trigger_data)
        .await?
        .wait()
        .await?;
    let _ = event_task.await;

    println!();
    println!("Execution Summary:");
    println!("   Execution ID: {}", execution.id);
    println!("   Status: {:?}", execution.status);
    if let Some(error) = &execution.error_message {
        println!("   Error: {}", error);
    }
    for entry in &execution.log {
        let marker = match entry.status {
            LogStatus::Completed => "ok",
            LogStatus::Failed => "failed",
            LogStatus::Skipped => "skipped",
            LogStatus::Started => "started",
        };
        println!("   [{}] {} ({})", marker, entry.node_name, entry.node_type);
    }

    let sent = builtins.outbox.sent().await;
    if !sent.is_empty() {
        println!();
        println!("Outbox:");
        for message in sent {
            println!("   to {}: {}", message.to, message.subject);
        }
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    match validate(&workflow) {
        Ok(()) => {
            println!("Workflow is valid:");
            println!("   Name: {}", workflow.name);
            println!("   Nodes: {}", workflow.nodes.len());
            println!("   Connections: {}", workflow.connections.len());
            Ok(())
        }
        Err(errors) => {
            for message in errors.messages() {
                println!("   - {}", message);
            }
            bail!("workflow has {} validation error(s)", errors.0.len())
        }
    }
}

fn list_actions() {
    let mut catalog = DefinitionCatalog::new();
    trellisactions::register_definitions(&mut catalog);

    println!("Triggers:");
    for trigger in catalog.triggers() {
        println!("  - {} ({})", trigger.trigger_type, trigger.name);
        println!("    {}", trigger.description);
    }

    println!();
    println!("Actions:");
    for action in catalog.actions() {
        println!("  - {} ({})", action.action_type, action.category);
        println!("    {}", action.description);
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Welcome new signups", TriggerType::Manual);
    workflow.description = Some("Emails a welcome message to signups on the pro plan".to_string());

    let trigger = workflow.add_node(Node::trigger("Signup received").with_position(100.0, 100.0));
    let check = workflow.add_node(
        Node::condition("Is pro plan", "{{plan}} == pro").with_position(300.0, 100.0),
    );
    let email = workflow.add_node(
        Node::action(
            "Send welcome email",
            "send_email",
            trelliscore::into_payload(json!({
                "to": "{{email}}",
                "subject": "Welcome, {{name}}!",
                "body": "Thanks for choosing the {{plan}} plan."
            })),
        )
        .with_position(500.0, 100.0),
    );

    workflow.connect(trigger, check);
    workflow.connect_when(check, email, "{{condition_result}} == true");

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  trellis run --file {} --input '{{\"email\": \"ada@example.com\", \"name\": \"Ada\", \"plan\": \"pro\"}}'",
        output.display()
    );

    Ok(())
}
