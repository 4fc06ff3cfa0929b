mod config;

use std::sync::Arc;

use config::ConsoleConfig;
use courier_core::carrier::{CarrierApi, HttpCarrier, SandboxCarrier};
use courier_core::Team;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "warn,courier_core=warn,courier=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cfg = ConsoleConfig::load();

    let carrier: Arc<dyn CarrierApi> = match &cfg.carrier.api_key {
        Some(key) => {
            info!(target = "courier", mode = ?cfg.carrier.mode, "Using HTTP carrier client");
            Arc::new(HttpCarrier::new(key.clone(), cfg.carrier.base_url.clone()))
        }
        None => {
            info!(target = "courier", "No carrier API key configured; using sandbox");
            Arc::new(SandboxCarrier::new())
        }
    };

    let mut team = Team::new(carrier);
    team.start().await?;

    println!("🚀 Courier team online. Describe what you need, or type 'help'.\n");

    // Print each finished conversation as it lands.
    let mut summaries = team.orchestrator.summaries();
    let printer = tokio::spawn(async move {
        while let Ok(summary) = summaries.recv().await {
            println!("\n✅ Done in {}ms: {}", summary.elapsed_ms, summary.request);
            for reply in &summary.replies {
                let body = serde_json::to_string_pretty(&reply.body)
                    .unwrap_or_else(|_| reply.body.to_string());
                println!("\n── {} ──\n{}", reply.role, body);
            }
            print_prompt().await;
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    print_prompt().await;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            print_prompt().await;
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => break,
            "help" => {
                println!("Commands:");
                println!("  status  - worker status and bus statistics");
                println!("  tasks   - requests still waiting on worker replies");
                println!("  help    - this message");
                println!("  exit    - shut down and leave");
                println!("Anything else is treated as a request for the team.");
            }
            "status" => {
                println!("Workers:");
                for worker in team.workers() {
                    println!(
                        "  {:<18} {:<8} [{}]",
                        worker.name,
                        worker.status.to_string(),
                        worker.capabilities.join(", ")
                    );
                }
                let stats = team.bus.stats();
                println!(
                    "Bus: {} messages, {} active conversations",
                    stats.total_messages, stats.active_conversations
                );
                for (role, role_stats) in &stats.per_role {
                    println!(
                        "  {:<18} total={} pending={} completed={} failed={}",
                        role.to_string(),
                        role_stats.total,
                        role_stats.pending,
                        role_stats.completed,
                        role_stats.failed
                    );
                }
            }
            "tasks" => {
                let open = team.orchestrator.open_requests();
                if open.is_empty() {
                    println!("No open requests.");
                }
                for request in open {
                    println!(
                        "  {} ({}/{} replies): {}",
                        request.conversation_id,
                        request.received,
                        request.expected,
                        request.request
                    );
                }
            }
            _ => {
                let plan = team.orchestrator.handle_request(input).await;
                println!("📋 {}", plan.description);
                for task in &plan.tasks {
                    println!("  → {}: {}", task.role, task.task);
                }
            }
        }
        print_prompt().await;
    }

    printer.abort();
    team.shutdown().await?;
    println!("👋 Bye.");
    Ok(())
}

async fn print_prompt() {
    let mut stdout = tokio::io::stdout();
    let _ = stdout.write_all(b"courier> ").await;
    let _ = stdout.flush().await;
}
