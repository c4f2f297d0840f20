//! An interactive marketing pipeline in the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use marketeer::core::role::RoleId;
use marketeer::core::{
    DEFAULT_MAX_CORRECTION_CYCLES, Engine, Error, Event, Outcome,
};
use marketeer::{
    AgentsConfig, Context, ContextOptions, Credentials, PipelineBuilder,
};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

/// Turns a website into a marketing campaign, one role at a time.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the role configuration file.
    #[arg(long, default_value = "agents_config.toml")]
    config: PathBuf,

    /// The completion model.
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible service.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Base URL of the Firecrawl service.
    #[arg(long, env = "FIRECRAWL_BASE_URL")]
    firecrawl_base_url: Option<String>,

    /// How many invalid tool calls in a row the model may correct.
    #[arg(long, default_value_t = DEFAULT_MAX_CORRECTION_CYCLES)]
    max_correction_cycles: usize,

    /// The role that talks to the user first.
    #[arg(long, default_value = "user_interface_agent")]
    entry_role: RoleId,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Loaded before parsing, so that `.env` values back the `env` args.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let result = match setup(&args, event_tx) {
        Ok(engine) => repl(engine, args.entry_role, event_rx).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

fn setup(
    args: &Args,
    event_tx: UnboundedSender<Event>,
) -> Result<Engine, Error> {
    let credentials = Credentials::from_env()?;
    let agents = AgentsConfig::load(&args.config)?;
    let options = ContextOptions {
        model: args.model.clone(),
        openai_base_url: args.base_url.clone(),
        firecrawl_base_url: args.firecrawl_base_url.clone(),
    };
    let context = Context::new(credentials, options, agents);

    PipelineBuilder::with_context(&context)
        .with_max_correction_cycles(args.max_correction_cycles)
        .on_event(move |event| {
            event_tx.send(event).ok();
        })
        .build()
}

async fn repl(
    engine: Engine,
    entry: RoleId,
    mut event_rx: UnboundedReceiver<Event>,
) -> Result<(), Error> {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut stdin = io::BufReader::new(io::stdin());
    let mut run = engine.start(entry)?;
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let mut printer = Printer::new(&engine, progress_style.clone());
        let result = {
            let mut submit = pin!(run.submit(line));
            loop {
                printer.tick();
                select! {
                    result = &mut submit => break result,
                    Some(event) = event_rx.recv() => printer.print(event),
                    _ = sleep(Duration::from_millis(100)) => {}
                }
            }
        };
        while let Ok(event) = event_rx.try_recv() {
            printer.print(event);
        }
        printer.finish();

        match result {
            Ok(Outcome::Reply(_)) => {}
            Ok(Outcome::Done(_)) => {
                println!(
                    "{}✅ {}",
                    BAR_CHAR.bright_green(),
                    "Campaign complete, starting over.".bright_white()
                );
                run = engine.start(entry)?;
            }
            Err(err) => {
                println!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_white());
                run = engine.start(entry)?;
            }
        }
    }
    Ok(())
}

/// Renders engine events, with a spinner while nothing is streaming.
struct Printer<'a> {
    engine: &'a Engine,
    style: ProgressStyle,
    spinner: Option<ProgressBar>,
    speaking: Option<RoleId>,
}

impl<'a> Printer<'a> {
    fn new(engine: &'a Engine, style: ProgressStyle) -> Self {
        Self {
            engine,
            style,
            spinner: None,
            speaking: None,
        }
    }

    fn tick(&mut self) {
        if self.speaking.is_some() {
            return;
        }
        self.spinner
            .get_or_insert_with(|| {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(self.style.clone());
                spinner.set_message("🤔 Thinking...");
                spinner
            })
            .inc(1);
    }

    fn print(&mut self, event: Event) {
        // Finish the spinner before printing anything else.
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }

        match event {
            Event::Delta { role, text } => {
                if self.speaking != Some(role) {
                    self.end_line();
                    print!(
                        "{}🤖 {}: ",
                        BAR_CHAR.bright_cyan(),
                        self.role_name(role).bold()
                    );
                    self.speaking = Some(role);
                }
                print!("{}", text.bright_white());
                std::io::stdout().flush().ok();
            }
            Event::ToolCall { tool, .. } => {
                self.end_line();
                println!("{}🔧 {}", BAR_CHAR.bright_yellow(), tool.dimmed());
            }
            Event::Handoff { from, to } => {
                self.end_line();
                println!(
                    "{}↪️  {} → {}",
                    BAR_CHAR.bright_magenta(),
                    self.role_name(from),
                    self.role_name(to).bold()
                );
            }
            Event::Correction { role, error } => {
                debug!("{role} is correcting a tool call: {error}");
            }
        }
    }

    fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.end_line();
    }

    fn end_line(&mut self) {
        if self.speaking.take().is_some() {
            println!();
        }
    }

    fn role_name(&self, id: RoleId) -> &'a str {
        self.engine
            .roles()
            .get(id)
            .map(|role| role.name())
            .unwrap_or(id.as_str())
    }
}

async fn read_line<R>(input: &mut R) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    match input.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
