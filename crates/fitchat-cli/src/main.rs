use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fitchat_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use fitchat_contracts::events::EventWriter;
use fitchat_contracts::session::{ChatTurn, Role, TaskKind};
use fitchat_engine::config::{parse_timeout_secs, ClientConfig};
use fitchat_engine::{
    ConversationController, GeminiClient, ImageOutcome, ImageUpload, Notice, NoticeLevel,
    Presenter, TextOutcome,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Parser)]
#[command(name = "fitchat", version, about = "Chat with an AI fitness trainer and nutritionist")]
struct Cli {
    /// Model name, overrides FITCHAT_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Request timeout in seconds, overrides FITCHAT_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout: Option<String>,
    /// Append session events to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default).
    Chat,
    /// Ask one question and print the reply.
    Ask(AskArgs),
    /// Analyze one food or equipment photo.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Parser)]
struct AskArgs {
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    task: TaskKind,
    path: PathBuf,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fitchat error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FITCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let controller = build_controller(&cli)?;
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            run_chat(controller)?;
            Ok(0)
        }
        Command::Ask(args) => Ok(run_ask(controller, &args.text.join(" "))),
        Command::Analyze(args) => run_analyze(controller, args),
    }
}

fn build_controller(cli: &Cli) -> Result<ConversationController<GeminiClient>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(model) = cli.model.as_deref() {
        config = config.with_model(model);
    }
    if let Some(raw) = cli.timeout.as_deref() {
        config = config.with_timeout(parse_timeout_secs(raw));
    }
    debug!(?config, "client configured");

    let client = GeminiClient::new(config)?;
    let mut controller = ConversationController::new(client);
    if let Some(path) = cli.events.as_ref() {
        let writer = EventWriter::for_new_session(path);
        debug!(session_id = writer.session_id(), path = %writer.path().display(), "recording session events");
        controller = controller.with_events(writer);
    }
    Ok(controller)
}

fn run_chat(mut controller: ConversationController<GeminiClient>) -> Result<()> {
    let mut presenter = TerminalPresenter::new(io::stdout());
    presenter.render(controller.history());
    println!("Type /help for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_intent(&line) {
            Intent::Noop => continue,
            Intent::Quit => break,
            Intent::Help => print_help(),
            Intent::History => {
                let labels = controller.state().history_labels();
                if labels.is_empty() {
                    println!("No messages yet.");
                }
                for label in labels {
                    println!("{label}");
                }
            }
            Intent::Clear => controller.clear(&mut presenter),
            Intent::Message(text) => {
                controller.submit_text(&text, &mut presenter);
            }
            Intent::Upload { task, path } => {
                if path.is_empty() {
                    println!("/{task} requires a path");
                    continue;
                }
                let bytes = match read_upload(Path::new(&path)) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        println!("Upload failed: {err:#}");
                        continue;
                    }
                };
                if controller.upload_image(ImageUpload { bytes, task }, &mut presenter)
                    == ImageOutcome::Duplicate
                {
                    println!("That {task} image was already analyzed.");
                }
            }
            Intent::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}

fn run_ask(mut controller: ConversationController<GeminiClient>, text: &str) -> i32 {
    let mut presenter = TerminalPresenter::resuming(io::stdout(), controller.history().len() + 1);
    match controller.submit_text(text, &mut presenter) {
        TextOutcome::Responded => 0,
        TextOutcome::Ignored => {
            eprintln!("nothing to ask");
            2
        }
    }
}

fn run_analyze(mut controller: ConversationController<GeminiClient>, args: AnalyzeArgs) -> Result<i32> {
    let bytes = read_upload(&args.path)?;
    let mut presenter = TerminalPresenter::resuming(io::stdout(), controller.history().len() + 1);
    let outcome = controller.upload_image(
        ImageUpload {
            bytes,
            task: args.task,
        },
        &mut presenter,
    );
    Ok(if outcome == ImageOutcome::Analyzed { 0 } else { 1 })
}

fn print_help() {
    println!("Commands:");
    for (command, description) in CHAT_HELP_COMMANDS {
        println!("  {command:<20} {description}");
    }
}

fn check_upload_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "unsupported file type for {} (expected {})",
            path.display(),
            UPLOAD_EXTENSIONS.join(", ")
        );
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<Vec<u8>> {
    check_upload_extension(path)?;
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Prints turns as they are added. When the history shrinks (after a clear)
/// the whole history is printed again.
struct TerminalPresenter<W: Write> {
    out: W,
    rendered: usize,
    floor: usize,
}

impl<W: Write> TerminalPresenter<W> {
    fn new(out: W) -> Self {
        Self::resuming(out, 0)
    }

    /// Never prints turns before `floor`. One-shot commands use it to print
    /// only the reply.
    fn resuming(out: W, floor: usize) -> Self {
        Self {
            out,
            rendered: floor,
            floor,
        }
    }

    fn write_turns(&mut self, turns: &[ChatTurn]) -> io::Result<()> {
        for turn in turns {
            writeln!(self.out, "{}", format_turn(turn))?;
        }
        self.out.flush()
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render(&mut self, history: &[ChatTurn]) {
        let start = if history.len() < self.rendered {
            self.floor
        } else {
            self.rendered
        };
        let start = start.max(self.floor).min(history.len());
        if let Err(err) = self.write_turns(&history[start..]) {
            warn!(error = %err, "failed to write chat output");
        }
        self.rendered = history.len();
    }

    fn notice(&mut self, notice: &Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "..",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "!!",
        };
        if let Err(err) = writeln!(self.out, "[{tag}] {}", notice.message) {
            warn!(error = %err, "failed to write notice");
        }
    }
}

fn format_turn(turn: &ChatTurn) -> String {
    let speaker = match turn.role() {
        Role::User => "You",
        Role::Assistant => "Trainer",
    };
    let mut text = format!("{speaker}: {}", turn.content());
    if let Some(image) = turn.image() {
        text.push_str(&format!(
            "\n     [image {}x{}, {}]",
            image.width(),
            image.height(),
            human_size(image.byte_len())
        ));
    }
    text
}

fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
