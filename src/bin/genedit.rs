//! CLI for genedit - AI image editing.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use genedit::present::{self, CommandShare, ShareOutcome, ShareTarget};
use genedit::{
    render, Config, EditClient, EditSession, EditedImage, GeminiEditClient, RequestStatus,
    SessionHandle, UploadedImage,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "genedit")]
#[command(about = "Edit an image with a natural-language instruction via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model: nano-banana, nano-banana-pro, or a raw model id
    #[arg(long, global = true)]
    model: Option<String>,

    /// Request timeout in seconds (default: wait indefinitely)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Program used to share results, e.g. xdg-open
    #[arg(long, global = true)]
    share_command: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit one image and save the result
    Edit(EditArgs),

    /// Interactive session: open, prompt, generate, download, share
    Interactive,

    /// Verify the API key and model
    Check,
}

#[derive(Args)]
struct EditArgs {
    /// Image to edit (PNG, JPEG or WebP)
    input: PathBuf,

    /// Edit instruction
    #[arg(short, long)]
    prompt: Option<String>,

    /// Directory for the edited image
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Share the result after saving it
    #[arg(long)]
    share: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = GeminiEditClient::new(&config)?;

    match cli.command {
        Commands::Edit(args) => {
            run_edit(args, &config, &client, cli.json).await?;
        }
        Commands::Interactive => {
            run_interactive(&config, client).await?;
        }
        Commands::Check => {
            client.health_check().await?;
            println!(
                "{}: API key accepted, model {} available",
                client.name(),
                client.model()
            );
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("cannot start genedit")?;

    if let Some(ref model) = cli.model {
        config = config.with_model(model.parse()?);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(ref command) = cli.share_command {
        config = config.with_share_command(command.clone());
    }

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn share_target(config: &Config) -> Option<CommandShare> {
    config.share_command().and_then(CommandShare::parse)
}

fn share_result(image: &EditedImage, target: Option<&CommandShare>) -> ShareOutcome {
    present::share(image, target.map(|t| t as &dyn ShareTarget))
}

async fn run_edit(
    args: EditArgs,
    config: &Config,
    client: &GeminiEditClient,
    json_output: bool,
) -> anyhow::Result<()> {
    let image = UploadedImage::open(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let mut session = EditSession::new();
    session.select_image(image);
    if let Some(prompt) = args.prompt {
        session.set_instruction(prompt);
    }

    session.generate(client).await?;

    let edited = match session.status() {
        RequestStatus::Success(edited) => edited,
        RequestStatus::Error(message) => {
            if json_output {
                let result = serde_json::json!({
                    "type": "edit",
                    "success": false,
                    "error": message,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!("{message}");
        }
        other => anyhow::bail!("edit did not finish (status: {})", other.label()),
    };

    let path = present::download(edited, &args.output_dir)?;
    let shared = args
        .share
        .then(|| share_result(edited, share_target(config).as_ref()));

    if json_output {
        let result = serde_json::json!({
            "type": "edit",
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": edited.size(),
            "media_type": edited.media_type(),
            "model": config.model().as_str(),
            "shared": shared.as_ref().map(|s| *s == ShareOutcome::Shared),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render(&session));
        println!("Saved: {}", path.display());
        if let Some(notice) = shared.and_then(|s| s.notice()) {
            println!("{notice}");
        }
    }

    Ok(())
}

const INTERACTIVE_HELP: &str = "\
Commands:
  open <path>       select an image (PNG, JPEG, WebP)
  prompt [text]     show or set the edit instruction
  generate          start the edit (runs in the background)
  status            show the result area
  download [dir]    save the edited image (default: current dir)
  share             share the edited image
  help              show this help
  quit              exit";

async fn run_interactive(config: &Config, client: GeminiEditClient) -> anyhow::Result<()> {
    let handle = SessionHandle::new(EditSession::new(), Arc::new(client));
    let target = share_target(config);

    println!("{INTERACTIVE_HELP}");
    println!(
        "Instruction: {}",
        handle.with_session(|s| s.instruction().to_string())
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "open" => open_image(&handle, rest),
            "prompt" if rest.is_empty() => println!(
                "Instruction: {}",
                handle.with_session(|s| s.instruction().to_string())
            ),
            "prompt" => handle.set_instruction(rest),
            "generate" => match handle.trigger_generate() {
                Ok(_) => println!("Generating... (type `status` to check)"),
                Err(rejected) => println!("{rejected}"),
            },
            "status" => println!("{}", handle.with_session(|s| render(s).to_string())),
            "download" => {
                let dir = PathBuf::from(if rest.is_empty() { "." } else { rest });
                match current_result(&handle) {
                    Some(edited) => {
                        // Keep file I/O off the runtime.
                        let saved =
                            tokio::task::spawn_blocking(move || present::download(&edited, dir))
                                .await?;
                        match saved {
                            Ok(path) => println!("Saved: {}", path.display()),
                            Err(e) => println!("Download failed: {e}"),
                        }
                    }
                    None => println!("No edited image yet."),
                }
            }
            "share" => match current_result(&handle) {
                Some(edited) => {
                    // The share program may wait on the user.
                    let target = target.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        share_result(&edited, target.as_ref())
                    })
                    .await?;
                    if let Some(notice) = outcome.notice() {
                        println!("{notice}");
                    }
                }
                None => println!("No edited image yet."),
            },
            "help" => println!("{INTERACTIVE_HELP}"),
            "quit" | "exit" => break,
            other => println!("Unknown command '{other}'. Type `help`."),
        }
    }

    Ok(())
}

fn open_image(handle: &SessionHandle, path: &str) {
    if path.is_empty() {
        println!("Usage: open <path>");
        return;
    }
    match UploadedImage::open(path) {
        Ok(image) => {
            println!(
                "Loaded {} ({}, {} bytes)",
                path,
                image.media_type(),
                image.size()
            );
            handle.select_image(image);
        }
        Err(e) => println!("Could not open {path}: {e}"),
    }
}

fn current_result(handle: &SessionHandle) -> Option<EditedImage> {
    handle.with_session(|s| s.result().cloned())
}
