use anyhow::Context;
use clap::{Parser, Subcommand};
use corrective_rag::rag::builder::Builder;
use corrective_rag::rag::config::RagConfig;
use corrective_rag::rag::server;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML config file (defaults to ./crag.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question in a conversation
    Ask {
        /// Conversation id; a new one is generated when omitted
        #[arg(long)]
        conversation: Option<String>,

        /// The message to send
        #[arg(short, long)]
        message: String,

        /// User whose profile is loaded and updated
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Print the checkpointed state of a conversation
    Show {
        #[arg(long)]
        conversation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = RagConfig::load(args.config.as_deref()).context("loading configuration")?;
    let engine = Builder::new(config)
        .build()
        .await
        .context("building the workflow engine")?;

    match args.command {
        Commands::Ask {
            conversation,
            message,
            user,
        } => {
            let conversation =
                conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let user = user.unwrap_or_else(|| engine.default_user().to_string());
            log::info!("Asking in conversation {} as {}", conversation, user);

            let outcome = engine.run_turn_as(&user, &conversation, &message).await?;
            let state = &outcome.state;

            println!("{}", state.answer);
            if !state.citations.is_empty() {
                println!("\nSources:");
                for citation in &state.citations {
                    println!("  {}", citation);
                }
            }
            if state.low_confidence {
                println!("\n(low confidence: the answer could not be fully verified)");
            }
            println!("\nconversation: {}", outcome.conversation_id);
            println!("trace: {}", state.trace_names().join(" -> "));
            if !outcome.durable {
                eprintln!("warning: this turn was not saved");
            }
        }
        Commands::Serve { port } => {
            server::serve(Arc::new(engine), port).await?;
        }
        Commands::Show { conversation } => match engine.load(&conversation).await? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => anyhow::bail!("conversation {} not found", conversation),
        },
    }

    Ok(())
}
