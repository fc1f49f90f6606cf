//! Runs one task against a Docker container, or the host, from the terminal.

#[macro_use]
extern crate tracing;

use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use terminal_agent::core::AgentEvent;
use terminal_agent::{
    AgentConfigBuilder, DockerEnvironment, Environment, LocalEnvironment,
    TaskRunner,
};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

const USAGE: &str = "\
Usage: terminal-agent [--container NAME] [--model ID] INSTRUCTION...

Runs INSTRUCTION inside the running Docker container NAME, or on this
machine when no container is given.

Environment:
  OPENROUTER_API_KEY              API key (required)
  TERMINAL_AGENT_MODEL            model id
  TERMINAL_AGENT_BASE_URL         endpoint base URL
  TERMINAL_AGENT_COMMAND_TIMEOUT  shell timeout in seconds
  TERMINAL_AGENT_VISION_MODEL     model id for read_image
  TERMINAL_AGENT_MAX_TURNS        turn limit";

#[derive(Debug, Default)]
struct Args {
    container: Option<String>,
    model: Option<String>,
    instruction: String,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut words = vec![];
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(String::new()),
            "--container" | "--model" => {
                let Some(value) = args.next() else {
                    return Err(format!("{arg} needs a value"));
                };
                if arg == "--container" {
                    parsed.container = Some(value);
                } else {
                    parsed.model = Some(value);
                }
            }
            "--" => {
                words.extend(args.by_ref());
            }
            flag if flag.starts_with("--") && words.is_empty() => {
                return Err(format!("unknown option {flag}"));
            }
            _ => words.push(arg),
        }
    }
    parsed.instruction = words.join(" ");
    if parsed.instruction.trim().is_empty() {
        return Err("no instruction given".to_owned());
    }
    Ok(parsed)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{}: {message}\n", "error".bright_red());
            }
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    let config = match AgentConfigBuilder::from_env().and_then(|builder| {
        match args.model {
            Some(model) => builder.with_model(model),
            None => builder,
        }
        .build()
    }) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {err}", "error".bright_red());
            return ExitCode::FAILURE;
        }
    };
    info!("running with {config:?}");

    let environment: Arc<dyn Environment> = match args.container {
        Some(container) => Arc::new(DockerEnvironment::new(container)),
        None => Arc::new(LocalEnvironment::new()),
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let runner = TaskRunner::new(config, environment).on_event(move |event| {
        event_tx.send(event.clone()).ok();
    });

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut progress_bar: Option<ProgressBar> = None;

    let mut task = pin!(runner.run(&args.instruction));
    let result = loop {
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🤔 Working...");
                progress_bar
            })
            .inc(1);

        select! {
            result = &mut task => break result,
            Some(event) = event_rx.recv() => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                print_event(&event);
            }
            _ = sleep(Duration::from_millis(100)) => {}
        }
    };
    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
    // Events sent right before the task finished.
    while let Ok(event) = event_rx.try_recv() {
        print_event(&event);
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err}", "error".bright_red());
            ExitCode::FAILURE
        }
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ModelResponse {
            transcript,
            tool_calls,
            ..
        } => {
            if !transcript.is_empty() && !tool_calls.is_empty() {
                println!(
                    "{}🤖 {}",
                    BAR_CHAR.bright_cyan(),
                    transcript.bright_white()
                );
            }
            for call in tool_calls {
                println!(
                    "{}🔧 {} {}",
                    BAR_CHAR.bright_yellow(),
                    call.name.bright_white().bold(),
                    call.arguments.to_string().dimmed()
                );
            }
        }
        AgentEvent::ToolResult { content, .. } => {
            for line in content.lines().take(8) {
                println!("{}   {}", BAR_CHAR.bright_yellow(), line.dimmed());
            }
        }
        AgentEvent::FinalResponse(text) => {
            println!(
                "\n{}✅ {}",
                BAR_CHAR.bright_green(),
                text.bright_white()
            );
        }
    }
}
