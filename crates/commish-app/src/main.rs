// Commish entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Load .env files, resolve the base directory
// 3. Initialize tracing (log to file; stderr too with --verbose)
// 4. Load config, apply CLI credentials
// 5. Check the API key when the action needs the model
// 6. Build the pipeline, run the action
// 7. Print the document or write it to --out

use std::path::Path;

use commish_app::cli::{self, CliArgs, Invocation};
use commish_app::config::{self, Config};
use commish_app::export;
use commish_app::pipeline;
use commish_core::model::WeekContext;
use commish_llm::LlmEvent;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse the command line
    let today = chrono::Local::now().date_naive();
    let args = match cli::parse_args(std::env::args().skip(1), today) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            eprintln!("{}", cli::HELP);
            return Ok(());
        }
        Err(e) => {
            eprintln!("error: {e}\n\n{}", cli::HELP);
            std::process::exit(2);
        }
    };

    // 2. Environment files; .env.local wins over .env
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    let base_dir = config::resolve_base_dir();

    // 3. Initialize tracing
    init_tracing(&base_dir, args.verbose)?;
    info!(base_dir = %base_dir.display(), "commish starting up");

    // 4. Load config
    let mut config = config::load_config(&base_dir).context("failed to load configuration")?;
    apply_cli_credentials(&mut config, &args);
    info!(
        provider = %config.generation.provider,
        model = %config.generation.model,
        starter_rule = ?config.league.starter_rule,
        "config loaded"
    );

    let league_id = args
        .league_id
        .or(config.league.league_id)
        .context("no league id: pass --league or set LEAGUE_ID")?;
    let ctx = WeekContext::new(league_id, args.year, args.week);

    // 5. Fail before any fetch when the model is required
    if args.action.needs_api_key() {
        config
            .require_api_key()
            .context("cannot generate this document without an API key")?;
    } else if config.api_key().is_none() {
        warn!("no API key configured; preview quotes will use fallback text");
    }

    // 6. Build and run
    let (events_tx, printer) = if args.stream {
        let (tx, rx) = mpsc::channel(256);
        (Some(tx), Some(tokio::spawn(print_stream(rx))))
    } else {
        (None, None)
    };

    let pipeline =
        pipeline::live_pipeline(&config, events_tx).context("failed to build pipeline")?;
    let result = pipeline.run(ctx, args.action).await;

    // Dropping the pipeline closes the event channel so the printer finishes.
    drop(pipeline);
    if let Some(printer) = printer {
        printer.await.ok();
    }

    let doc = result
        .with_context(|| format!("failed to build {} for {ctx}", args.action.kind().label()))?;
    if doc.used_fallback {
        warn!(context = %ctx, "document contains fallback quotes");
    }

    // 7. Output
    match &args.out {
        Some(out) => {
            let path = export::write_document(out, &doc).context("failed to export document")?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{}", doc.markdown),
    }

    info!(context = %ctx, kind = doc.kind.label(), "done");
    Ok(())
}

fn apply_cli_credentials(config: &mut Config, args: &CliArgs) {
    if let Some(s2) = &args.espn_s2 {
        config.credentials.espn_s2 = Some(s2.clone());
    }
    if let Some(swid) = &args.swid {
        config.credentials.swid = Some(swid.clone());
    }
}

/// Echo streamed tokens to stderr.
async fn print_stream(mut rx: mpsc::Receiver<LlmEvent>) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    while let Some(event) = rx.recv().await {
        match event {
            LlmEvent::Token { text } => {
                let _ = write!(stderr, "{text}");
                let _ = stderr.flush();
            }
            LlmEvent::Complete { .. } => {
                let _ = writeln!(stderr);
            }
            LlmEvent::Error { message } => {
                let _ = writeln!(stderr, "\n[generation error] {message}");
            }
        }
    }
}

fn init_tracing(base_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_dir.join("commish.log"))?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("commish=info,warn")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let installed = if verbose {
        let subscriber = builder
            .with_writer(log_file.and(std::io::stderr))
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        tracing::subscriber::set_global_default(builder.with_writer(log_file).finish())
    };
    installed.context("failed to set tracing subscriber")?;

    Ok(())
}
