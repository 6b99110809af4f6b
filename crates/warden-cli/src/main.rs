//! CLI surface for the agentics sub-surface (spec.md §6 "CLI surface").

#![deny(unsafe_code)]

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_agents::agents::{approval_routing, constraint_solver, policy_enforcement};
use warden_agents::testing::{InMemoryPolicySource, NullRecordSink};
use warden_agents::{AgentEnvironment, EngineConfig, ExecutionContext};
use warden_approval::{ApprovalRule, Requester};
use warden_core::facade::{SystemClock, UuidSource};
use warden_policy::Policy;

#[derive(Parser, Debug)]
#[command(name = "warden", about = "Evaluate, resolve, and route actions through the policy engine")]
struct Cli {
    /// Directory of policy document files (`.json`/`.yaml`), loaded into an
    /// in-memory policy corpus. Adapters to a real policy store are out of
    /// scope, so this binary reads a local corpus directly off disk rather
    /// than through a service.
    #[arg(long, global = true)]
    policy_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a context against the policy engine; exits 0 iff allowed.
    Evaluate(EvalArgs),
    /// Resolve constraints over a context; always includes the full trace.
    Resolve(EvalArgs),
    /// Route an action through the approval rules.
    Route {
        #[command(flatten)]
        base: EvalArgs,
        /// JSON file holding a list of `ApprovalRule`s; empty if absent.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Requester id.
        #[arg(long, default_value = "cli-user")]
        requester_id: String,
    },
    /// Print agent registration metadata.
    Info,
    /// Register this agent instance with the record sink.
    Register,
}

#[derive(clap::Args, Debug)]
struct EvalArgs {
    /// A path to a JSON file, or an inline JSON literal.
    #[arg(long)]
    context: String,
    #[arg(long)]
    request_id: Option<String>,
    /// Comma-separated policy ids to restrict selection to.
    #[arg(long)]
    policies: Option<String>,
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[arg(long, default_value_t = false)]
    trace: bool,
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn load_context(spec: &str) -> Result<serde_json::Value> {
    let path = Path::new(spec);
    let text = if path.is_file() {
        std::fs::read_to_string(path).with_context(|| format!("reading context file {spec}"))?
    } else {
        spec.to_string()
    };
    serde_json::from_str(&text).with_context(|| "parsing --context as JSON".to_string())
}

fn load_policies(dir: &Path) -> Result<Vec<Policy>> {
    let mut policies = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading policy dir {dir:?}"))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match warden_policy::parser::load_file(&path) {
            Ok(policy) => policies.push(policy),
            Err(violations) => {
                anyhow::bail!("policy file {path:?} failed validation: {violations:?}");
            }
        }
    }
    Ok(policies)
}

fn load_rules(path: &Path) -> Result<Vec<ApprovalRule>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading rules file {path:?}"))?;
    serde_json::from_str(&text).with_context(|| "parsing rules file as a JSON ApprovalRule list".to_string())
}

async fn build_env(cli: &Cli) -> Result<AgentEnvironment> {
    let policies = match &cli.policy_dir {
        Some(dir) => load_policies(dir)?,
        None => Vec::new(),
    };
    Ok(AgentEnvironment::new(
        Arc::new(InMemoryPolicySource::new(policies)),
        Arc::new(NullRecordSink),
        Arc::new(warden_telemetry::TracingTelemetrySink),
        Arc::new(SystemClock),
        Arc::new(UuidSource),
        EngineConfig::from_env(),
    )
    .await)
}

fn exec_context(request_id: &str) -> ExecutionContext {
    ExecutionContext {
        execution_id: format!("cli-{request_id}"),
        parent_span_id: "cli".to_string(),
        correlation_id: format!("cli-{request_id}"),
    }
}

fn print_result(value: &impl serde::Serialize, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    warden_telemetry::init_json_logging();
    let cli = Cli::parse();

    match &cli.cmd {
        Command::Evaluate(args) => {
            let env = build_env(&cli).await?;
            let request_id = args.request_id.clone().unwrap_or_else(|| "cli-evaluate".to_string());
            let ctx = exec_context(&request_id);
            let req = policy_enforcement::EnforcementRequest {
                request_id,
                context: load_context(&args.context)?,
                policy_ids: args.policies.as_ref().map(|s| s.split(',').map(str::to_string).collect()),
                trace: args.trace,
            };
            if args.dry_run {
                print_result(&req.context, args.json)?;
                return Ok(());
            }
            let result = policy_enforcement::evaluate(&env, &ctx, req).await?;
            print_result(&result.event, args.json)?;
            std::process::exit(if result.allowed { 0 } else { 1 });
        }
        Command::Resolve(args) => {
            let env = build_env(&cli).await?;
            let request_id = args.request_id.clone().unwrap_or_else(|| "cli-resolve".to_string());
            let ctx = exec_context(&request_id);
            let req = constraint_solver::ConstraintSolverRequest {
                request_id,
                context: load_context(&args.context)?,
                external_constraints: Vec::new(),
            };
            let result = constraint_solver::resolve(&env, &ctx, req).await?;
            print_result(&result.event, args.json)?;
        }
        Command::Route { base, rules, requester_id } => {
            let env = build_env(&cli).await?;
            let request_id = base.request_id.clone().unwrap_or_else(|| "cli-route".to_string());
            let ctx = exec_context(&request_id);
            let approval_rules = match rules {
                Some(path) => load_rules(path)?,
                None => Vec::new(),
            };
            let req = approval_routing::ApprovalRoutingRequest {
                request_id,
                rules: approval_rules,
                action_context: load_context(&base.context)?,
                requester: Requester { id: requester_id.clone(), roles: Vec::new() },
                priority: None,
                rule_filter: base.policies.as_ref().map(|s| s.split(',').map(str::to_string).collect()),
                available_approvers: None,
            };
            let result = approval_routing::route_request(&env, &ctx, req).await?;
            print_result(&result.event, base.json)?;
        }
        Command::Info => {
            let cfg = EngineConfig::from_env();
            print_result(
                &json!({
                    "agent": "warden",
                    "version": env!("CARGO_PKG_VERSION"),
                    "env": cfg.env.as_str(),
                }),
                true,
            )?;
        }
        Command::Register => {
            let env = build_env(&cli).await?;
            let ack = env
                .record_sink
                .persist(
                    "agent_registration",
                    json!({
                        "agent": "warden",
                        "version": env!("CARGO_PKG_VERSION"),
                        "registered_at": env.clock.now_iso8601(),
                    }),
                )
                .await;
            if !ack.accepted {
                anyhow::bail!("registration rejected: {:?}", ack.reason);
            }
            println!("registered");
        }
    }
    Ok(())
}
