//! The `research-agent` command line tool.

#[macro_use]
extern crate tracing;

use std::io::{self as std_io, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use research_agent::core::{AgentEvent, ResearchRecord};
use research_agent::tools::DEFAULT_DESTINATION;
use research_agent::{Research, ResearchError, ResearcherBuilder};
use research_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

/// Answers a research question with web search, Wikipedia and a notes file.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The question to research. Asked interactively when omitted.
    query: Vec<String>,

    /// API key of the OpenAI-compatible service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the service, e.g. `https://api.openai.com/v1`.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Model name.
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Maximum number of model rounds.
    #[arg(long, default_value_t = research_agent::core::DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

    /// Time limit for each model round and tool call, in seconds.
    #[arg(long, value_name = "SECS")]
    round_timeout: Option<u64>,

    /// File the `save` tool appends to.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DESTINATION)]
    output: PathBuf,

    /// Characters returned by each Wikipedia lookup.
    #[arg(long, value_name = "N", default_value_t = 100)]
    wiki_chars: usize,

    /// Print the record as JSON.
    #[arg(long)]
    json: bool,

    /// Do not show tool activity.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std_io::stderr)
        .init();

    let cli = Cli::parse();

    let query = if cli.query.is_empty() {
        print!("What can I help you research? ");
        std_io::stdout().flush().ok();
        read_line().await.unwrap_or_default()
    } else {
        cli.query.join(" ")
    };
    let query = query.trim();
    if query.is_empty() {
        eprintln!("{}", "Nothing to research.".bright_red());
        return ExitCode::FAILURE;
    }

    let mut config = OpenAIConfigBuilder::with_api_key(cli.api_key);
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(config.build());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut builder = ResearcherBuilder::with_model_provider(model_provider)
        .with_max_rounds(cli.max_rounds)
        .with_output_path(cli.output)
        .with_lookup_chars(cli.wiki_chars)
        .on_event(move |event| {
            event_tx.send(event).ok();
        });
    if let Some(secs) = cli.round_timeout {
        builder = builder.with_round_timeout(Duration::from_secs(secs));
    }
    let researcher = builder.build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    let research = researcher.research(query);
    tokio::pin!(research);

    let mut progress_bar: Option<ProgressBar> = None;
    let result = loop {
        // Create a new progress bar if it has been finished.
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🔎 Researching...");
                progress_bar
            })
            .inc(1);

        let sleep = sleep(Duration::from_millis(100));
        let event = select! {
            result = &mut research => break result,
            Some(event) = event_rx.recv() => event,
            _ = sleep => continue,
        };
        if cli.quiet {
            continue;
        }

        let Some(line) = describe_event(&event) else {
            continue;
        };
        // Finish the progress bar before printing anything else.
        if let Some(progress_bar) = progress_bar.take() {
            progress_bar.finish_and_clear();
        }
        println!("{line}");
    };
    if let Some(progress_bar) = progress_bar {
        progress_bar.finish_and_clear();
    }

    match result {
        Ok(research) => {
            print_research(&research, cli.json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn describe_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::ToolCall { call, .. } => Some(format!(
            "{}🔧 {} {}",
            BAR_CHAR.bright_cyan(),
            call.name.bright_white().bold(),
            call.input_text().dimmed()
        )),
        AgentEvent::ToolResult { step, .. } if step.is_error => Some(format!(
            "{}⚠️  {}",
            BAR_CHAR.bright_yellow(),
            step.observation.bright_yellow()
        )),
        _ => None,
    }
}

fn print_research(research: &Research, json: bool) {
    if json {
        match serde_json::to_string_pretty(&research.record) {
            Ok(json) => println!("{json}"),
            Err(err) => error!("failed to serialize the record: {err}"),
        }
        return;
    }
    print_record(&research.record);
}

fn print_record(record: &ResearchRecord) {
    let bar = BAR_CHAR.bright_green();
    println!("\n{bar}{}", record.topic().bright_white().bold());
    println!("{bar}{}", record.summary());
    if !record.sources().is_empty() {
        println!("\n{}", "Sources:".bold());
        for source in record.sources() {
            println!("  - {source}");
        }
    }
    if !record.tools_used().is_empty() {
        println!("\n{} {}", "Tools used:".bold(), record.tools_used().join(", "));
    }
}

fn print_error(err: &ResearchError) {
    let headline = match err {
        ResearchError::Agent(_) => "The agent did not finish.",
        ResearchError::Output(_) => {
            "The agent finished, but its answer could not be parsed."
        }
    };
    eprintln!("{}", headline.bright_red().bold());
    eprintln!("{err}");
    if let Some(raw) = err.raw_output() {
        eprintln!("\n{}\n{raw}", "Raw output:".bold());
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
