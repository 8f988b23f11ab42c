mod backend;
mod logging;

use backend::CommandBackend;
use clap::Parser;
use futures::FutureExt;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_core::{CallScope, Message, Platform, SwitchboardConfig, ToolEntry};
use switchboard_pipeline::Pipeline;
use switchboard_registry::{builtin, Registry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG", default_value = "switchboard.toml")]
    config: PathBuf,

    /// Platform the terminal session pretends to be (feishu, discord, ...)
    #[arg(short, long, default_value = "discord")]
    platform: String,

    /// User id attached to every message
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Write logs to daily files in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the registered tools and exit
    #[arg(long)]
    list_tools: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = SwitchboardConfig::load_or_default(&args.config);
    if args.log_json {
        config.logging.json = true;
    }
    if let Some(dir) = args.log_dir.clone() {
        config.logging.dir = Some(dir);
    }
    let _log_guard = logging::init(&config.logging)?;

    info!("Initializing switchboard...");
    let registry = Arc::new(Registry::from_config(&config.registry));
    builtin::register_factories(&registry);

    let entries = if config.tools.is_empty() {
        vec![ToolEntry::new("echo", "echo")]
    } else {
        config.tools.clone()
    };
    match registry.load_from_config(&entries) {
        Ok(n) => info!("Loaded {} tool(s): {:?}", n, registry.list()),
        Err(e) => warn!("{}", e),
    }

    if args.list_tools {
        for tool in registry.describe() {
            println!("{}\t{}", tool.name, tool.description);
        }
        return Ok(());
    }

    let pipeline = Pipeline::new(Arc::new(CommandBackend::new(registry.clone())));
    let platform = Platform::from(args.platform.as_str());
    let root = CallScope::new();

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        println!(
            "Switchboard online as {} on {}. Type /tools for tools, 'quit' to exit.",
            args.user, platform
        );
    }
    prompt(interactive)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                root.cancel();
                break;
            }
        };
        let Some(line) = line else { break };
        let trimmed = line.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            prompt(interactive)?;
            continue;
        }

        let message = Message::new(&args.user, platform.clone(), trimmed)
            .with_metadata("source", "terminal")
            .with_reply(|text| {
                async move {
                    let mut out = tokio::io::stdout();
                    out.write_all(text.as_bytes()).await?;
                    out.write_all(b"\n").await?;
                    out.flush().await?;
                    Ok::<(), anyhow::Error>(())
                }
                .boxed()
            });

        // Ctrl-C while a message is in flight cancels that message only.
        let scope = root.child();
        let work = pipeline.process(&scope, &message);
        tokio::pin!(work);
        let result = tokio::select! {
            result = &mut work => result,
            _ = tokio::signal::ctrl_c() => {
                scope.cancel();
                work.await
            }
        };
        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                error!("{}: {:#}", e, e.error);
                e.into_response()
            }
        };
        if let Err(e) = message.reply(&response.text).await {
            error!("Failed to deliver reply: {}", e);
        }

        prompt(interactive)?;
    }

    if registry.orphaned() > 0 {
        info!("{} tool call(s) still winding down", registry.orphaned());
    }
    Ok(())
}

fn prompt(interactive: bool) -> std::io::Result<()> {
    if interactive {
        print!("> ");
        std::io::stdout().flush()?;
    }
    Ok(())
}
