use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kbmedia_core::{
    DocumentConfig, IngestRequest, LocatedAudio, MediaLibrary, S3MediaStore, Settings,
    StorageLocation, find_s3_link, format_audio_readable, format_video_readable, locate_audio,
    locate_audio_from_agent_response, locate_audio_from_expert, locate_video,
    format::format_clip,
    locator::find_s3_links,
    media::{SHOT_VIDEO_MIME, VIDEO_MIME},
};
use serde_json::Value;
use tokio::{fs, io::AsyncReadExt};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kbmedia")]
#[command(
    about = "Locate audio and video cited by knowledge-base responses, and resolve it for playback"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the audio sidecar and transcript segments cited by a response
    Audio {
        /// Response JSON file, or "-" for stdin
        input: String,

        #[command(flatten)]
        shape: ShapeArgs,

        /// Print JSON instead of the readable report
        #[arg(long)]
        json: bool,
    },

    /// Print the video sidecar, shots, summary and transcript cited by a response
    Video {
        /// Response JSON file, or "-" for stdin
        input: String,

        /// Print JSON instead of the readable report
        #[arg(long)]
        json: bool,
    },

    /// Find s3:// links in free text
    Link {
        /// Text to scan; joined with spaces
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Resolve the cited audio and print one playable URL per segment
    PlayAudio {
        /// Response JSON file, or "-" for stdin
        input: String,

        #[command(flatten)]
        shape: ShapeArgs,

        /// Also download the audio to this path
        #[arg(long)]
        download: Option<PathBuf>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Resolve the cited video and print its presigned source URL
    PlayVideo {
        /// Response JSON file, or "-" for stdin
        input: String,

        /// Treat the input as generated text and take the first s3:// link in it
        #[arg(long)]
        from_text: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print an ingest request for one document
    Document(DocumentArgs),
}

#[derive(Args)]
struct ShapeArgs {
    /// Input is an agent response rather than a retrieval response
    #[arg(long)]
    agent: bool,

    /// Only read documents from this expert (implies --agent)
    #[arg(long)]
    expert: Option<String>,
}

#[derive(Args)]
struct StoreArgs {
    /// Presigned URL lifetime in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    presign_ttl: Option<u64>,

    /// S3-compatible endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Skip the on-disk media cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocumentKind {
    /// Custom document with inline text
    CustomText,
    /// Custom document stored in S3
    CustomS3,
    /// Plain S3 data source document
    S3,
}

#[derive(Args)]
struct DocumentArgs {
    #[arg(long, value_enum, default_value = "custom-text")]
    kind: DocumentKind,

    #[arg(long)]
    knowledge_base_id: String,

    #[arg(long)]
    data_source_id: String,

    /// Document identifier (custom kinds)
    #[arg(long)]
    id: Option<String>,

    /// Inline text (custom-text)
    #[arg(long)]
    text: Option<String>,

    /// Document URI (custom-s3, s3)
    #[arg(long)]
    uri: Option<String>,

    /// URI of a metadata file to attach
    #[arg(long)]
    metadata_uri: Option<String>,

    #[arg(long)]
    bucket_owner: Option<String>,

    #[arg(long)]
    client_token: Option<String>,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .expect("spinner template is valid"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn read_text(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {input}"))
}

async fn read_response(input: &str) -> Result<Value> {
    let text = read_text(input).await?;
    serde_json::from_str(&text).with_context(|| format!("{input} is not valid JSON"))
}

fn locate(response: &Value, shape: &ShapeArgs) -> LocatedAudio {
    match (&shape.expert, shape.agent) {
        (Some(expert), _) => locate_audio_from_expert(response, expert),
        (None, true) => locate_audio_from_agent_response(response),
        (None, false) => locate_audio(response),
    }
}

async fn open_library(args: &StoreArgs) -> Result<MediaLibrary<S3MediaStore>> {
    let mut settings = Settings::from_env()?;
    if let Some(secs) = args.presign_ttl {
        settings.presign_ttl = Duration::from_secs(secs);
    }
    if let Some(endpoint) = &args.endpoint {
        settings.s3_endpoint = Some(endpoint.clone());
    }
    if args.no_cache {
        settings.cache_dir = None;
    }
    debug!(?settings, "store settings");

    let store = S3MediaStore::from_settings(&settings).await;
    Ok(MediaLibrary::new(store, &settings))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_banner(subtitle: &str) {
    println!(
        "\n{}  {}\n",
        style("kbmedia").cyan().bold(),
        style(subtitle).dim()
    );
}

async fn run_play_audio(
    input: &str,
    shape: &ShapeArgs,
    download: Option<PathBuf>,
    store: &StoreArgs,
) -> Result<()> {
    let located = locate(&read_response(input).await?, shape);
    let Some(sidecar) = located.source.clone() else {
        bail!("No audio file information found in response");
    };

    print_banner("Audio Playback");
    let library = open_library(store).await?;

    let spinner = create_spinner("Resolving audio sidecar...");
    let clips = library.segment_clips(&sidecar, &located.segments).await?;
    spinner.finish_with_message(format!(
        "{} Resolved {} {}",
        style("✓").green().bold(),
        sidecar,
        style(format!("({} segments)", clips.len())).dim()
    ));

    println!("{}", style("─".repeat(60)).dim());
    if clips.is_empty() {
        println!("{}", style("No transcript segments found").yellow());
    }
    for (position, clip) in clips.iter().enumerate() {
        println!("{}", format_clip(position + 1, clip));
        println!("{}", style("─".repeat(60)).dim());
    }

    if let Some(path) = download {
        let spinner = create_spinner("Downloading audio...");
        let payload = library.fetch_audio(&sidecar).await?;
        fs::write(&path, &payload.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        spinner.finish_with_message(format!(
            "{} Downloaded {} {}",
            style("✓").green().bold(),
            payload.media,
            style(format!("[{} Hz]", payload.sample_rate)).dim()
        ));
        println!(
            "\n{} {}\n",
            style("Saved:").dim(),
            style(path.display()).cyan()
        );
    }

    Ok(())
}

async fn run_play_video(input: &str, from_text: bool, store: &StoreArgs) -> Result<()> {
    let (sidecar, mime_type, report) = if from_text {
        let text = read_text(input).await?;
        let sidecar = find_s3_link(&text).context("No S3 link found in text")?;
        (sidecar, VIDEO_MIME, None)
    } else {
        let info = locate_video(&read_response(input).await?);
        let Some(sidecar) = info.s3_uri.clone() else {
            bail!("No video sidecar found in response");
        };
        (sidecar, SHOT_VIDEO_MIME, Some(format_video_readable(&info)))
    };

    print_banner("Video Playback");
    let library = open_library(store).await?;

    let spinner = create_spinner("Resolving video sidecar...");
    let source = library.video_source(&sidecar, mime_type).await?;
    spinner.finish_with_message(format!(
        "{} Resolved {}",
        style("✓").green().bold(),
        sidecar
    ));

    println!(
        "\n{} {}",
        style("Source:").dim(),
        style(&source.url).cyan()
    );
    println!("{} {}\n", style("Type:").dim(), source.mime_type);

    if let Some(report) = report {
        println!("{}", style("─".repeat(60)).dim());
        println!("{report}");
    }

    Ok(())
}

fn build_document(args: DocumentArgs) -> Result<IngestRequest> {
    let mut document = match args.kind {
        DocumentKind::CustomText => {
            let id = args.id.context("--id is required for custom documents")?;
            let text = args.text.context("--text is required for custom-text")?;
            DocumentConfig::custom_inline_text(id, text)
        }
        DocumentKind::CustomS3 => {
            let id = args.id.context("--id is required for custom documents")?;
            let uri = args.uri.context("--uri is required for custom-s3")?;
            StorageLocation::parse_s3_uri(&uri)
                .with_context(|| format!("{uri} is not an s3:// URI"))?;
            DocumentConfig::custom_s3(id, uri)
        }
        DocumentKind::S3 => {
            let uri = args.uri.context("--uri is required for s3")?;
            StorageLocation::parse_s3_uri(&uri)
                .with_context(|| format!("{uri} is not an s3:// URI"))?;
            DocumentConfig::s3(uri)
        }
    };

    if let Some(metadata_uri) = args.metadata_uri {
        document = document.with_metadata_location(metadata_uri, args.bucket_owner);
    }

    let mut request =
        IngestRequest::new(args.knowledge_base_id, args.data_source_id, vec![document]);
    if let Some(token) = args.client_token {
        request = request.with_client_token(token);
    }
    Ok(request)
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Audio { input, shape, json } => {
            let located = locate(&read_response(&input).await?, &shape);
            if json {
                return print_json(&located);
            }
            println!("{}", format_audio_readable(&located));
        }
        Command::Video { input, json } => {
            let info = locate_video(&read_response(&input).await?);
            if json {
                return print_json(&info);
            }
            println!("{}", format_video_readable(&info));
        }
        Command::Link { text } => {
            let links = find_s3_links(&text.join(" "));
            if links.is_empty() {
                bail!("No S3 link found in text");
            }
            for link in links {
                println!("{link}");
            }
        }
        Command::PlayAudio {
            input,
            shape,
            download,
            store,
        } => run_play_audio(&input, &shape, download, &store).await?,
        Command::PlayVideo {
            input,
            from_text,
            store,
        } => run_play_video(&input, from_text, &store).await?,
        Command::Document(args) => print_json(&build_document(args)?)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
