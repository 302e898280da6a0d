use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vidu_animator::{
    AspectRatio, Config, JobState, Resolution, Session, StatusPoller, UploadedAsset, ViduClient,
    VideoJobRequest, VideoProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Vidu Animator")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Animate a character over a background with the Vidu video API")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP gateway").arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("Port to listen on")
                    .value_parser(clap::value_parser!(u16)),
            ),
        )
        .subcommand(
            Command::new("generate")
                .about("Submit a job and follow it until the video is ready")
                .arg(
                    Arg::new("main")
                        .short('m')
                        .long("main")
                        .value_name("IMAGE")
                        .help("Main character image")
                        .required(true),
                )
                .arg(
                    Arg::new("background")
                        .short('b')
                        .long("background")
                        .value_name("IMAGE")
                        .help("Background image")
                        .required(true),
                )
                .arg(
                    Arg::new("extra")
                        .short('e')
                        .long("extra")
                        .value_name("IMAGE")
                        .help("Optional third image"),
                )
                .arg(
                    Arg::new("prompt")
                        .short('t')
                        .long("prompt")
                        .value_name("TEXT")
                        .help("What should happen in the video")
                        .required(true),
                )
                .arg(
                    Arg::new("aspect-ratio")
                        .short('a')
                        .long("aspect-ratio")
                        .value_name("RATIO")
                        .help("Frame shape")
                        .value_parser(["vertical", "horizontal", "square"])
                        .default_value("horizontal"),
                )
                .arg(
                    Arg::new("resolution")
                        .short('r')
                        .long("resolution")
                        .value_name("RES")
                        .help("Output resolution")
                        .value_parser(["360", "720"])
                        .default_value("720"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Check the status of a job once")
                .arg(Arg::new("id").value_name("VIDEO_ID").required(true)),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::from_env()
        }),
    };

    // Initialize logging
    let filter = if matches.get_flag("verbose") {
        EnvFilter::new("vidu_animator=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("vidu_animator={},warn", config.logging.level)))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(("serve", sub)) = matches.subcommand() {
        if let Some(port) = sub.get_one::<u16>("port") {
            config.server.port = *port;
        }
    }

    config.validate()?;
    info!("{}", config.summary());

    let provider: Arc<dyn VideoProvider> =
        Arc::new(ViduClient::new(&config).context("Failed to create Vidu client")?);

    match matches.subcommand() {
        Some(("serve", _)) => serve(provider, &config).await,
        Some(("generate", sub)) => generate(provider, &config, sub).await,
        Some(("status", sub)) => status(provider, &config, string_arg(sub, "id")).await,
        _ => Ok(()),
    }
}

#[cfg(feature = "api")]
async fn serve(provider: Arc<dyn VideoProvider>, config: &Config) -> Result<()> {
    vidu_animator::api::ApiServer::new(provider, config).start().await
}

#[cfg(not(feature = "api"))]
async fn serve(_provider: Arc<dyn VideoProvider>, _config: &Config) -> Result<()> {
    anyhow::bail!("this build does not include the HTTP gateway (enable the `api` feature)")
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> &'a str {
    args.get_one::<String>(name).map(String::as_str).unwrap_or_default()
}

async fn load_image(path: &str) -> Result<UploadedAsset> {
    let path = PathBuf::from(path);
    UploadedAsset::from_path(&path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))
}

async fn generate(provider: Arc<dyn VideoProvider>, config: &Config, args: &ArgMatches) -> Result<()> {
    let arg = |name: &str| string_arg(args, name);

    let extra = match args.get_one::<String>("extra") {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };
    let request = VideoJobRequest::new(arg("prompt"))
        .with_primary_image(load_image(arg("main")).await?)
        .with_background_image(load_image(arg("background")).await?)
        .with_optional_image(extra)
        .with_aspect_ratio(arg("aspect-ratio").parse::<AspectRatio>()?)
        .with_resolution(arg("resolution").parse::<Resolution>()?);

    let mut session = Session::new(provider, config);
    let job_id = session.start(request).await?;
    info!("🎬 Video {} submitted, waiting for the render...", job_id);

    let start_time = std::time::Instant::now();
    while let Some(snapshot) = session.next().await {
        info!("⏳ {} ({}%, estimated)", snapshot.state(), snapshot.progress());
    }

    let duration = start_time.elapsed();
    let Some(job) = session.latest() else {
        anyhow::bail!("watch ended without a result");
    };

    match job.state() {
        JobState::Completed => {
            info!("🎉 Video ready in {:.1}s", duration.as_secs_f64());
            println!("{}", job.result_url().unwrap_or_default());
            Ok(())
        }
        JobState::Error => {
            let message = job.error_message().unwrap_or_default();
            error!("❌ Video failed: {}", message);
            anyhow::bail!("video {} failed: {}", job_id, message)
        }
        state => {
            warn!("Watch stopped while the job was {}", state);
            Ok(())
        }
    }
}

async fn status(provider: Arc<dyn VideoProvider>, config: &Config, id: &str) -> Result<()> {
    let poller = StatusPoller::new(provider, config.polling.clone());
    let report = poller.check_once(id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
