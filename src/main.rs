use anyhow::Result;
use avatar_pipeline::avatar::AvatarProcessor;
use avatar_pipeline::models::{AvatarOwner, Config};
use avatar_pipeline::storage::{MockObjectStore, ObjectStore, S3ObjectStore};
use avatar_pipeline::uploader::AvatarUploader;
use avatar_pipeline::Error;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "avatar-pipeline")]
#[command(about = "Validate avatar images and render their WebP variants")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the 64px and 512px variants into a directory.
    Process {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Render an avatar and upload both variants to object storage.
    Upload {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(long, value_enum)]
        owner: OwnerKind,
        #[arg(long)]
        id: u64,
        /// Defaults to a random name.
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OwnerKind {
    Users,
    Actors,
}

impl OwnerKind {
    fn with_id(self, id: u64) -> AvatarOwner {
        match self {
            OwnerKind::Users => AvatarOwner::User(id),
            OwnerKind::Actors => AvatarOwner::Actor(id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env()?;
    let processor = AvatarProcessor::new(config.avatar_limits());

    let outcome = match args.command {
        Command::Process { input, out_dir } => process(&processor, &input, &out_dir).await,
        Command::Upload {
            input,
            owner,
            id,
            name,
        } => {
            let name = name.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            upload(&config, processor, &input, owner.with_id(id), &name).await
        }
    };

    if let Err(e) = outcome {
        error!("Avatar pipeline failed: {}", e);
        eprintln!("{}", failure_message(&e));
        std::process::exit(1);
    }
    Ok(())
}

/// Rejections read as the client would see them; local faults keep their cause.
fn failure_message(e: &Error) -> String {
    match e {
        Error::Avatar(_) | Error::InvalidName(_) => e.client_message(),
        _ => e.to_string(),
    }
}

async fn process(
    processor: &AvatarProcessor,
    input: &Path,
    out_dir: &Path,
) -> avatar_pipeline::Result<()> {
    let file = tokio::fs::File::open(input).await?;
    let variants = processor.process_reader(file).await?;

    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("avatar");
    tokio::fs::create_dir_all(out_dir).await?;

    let thumbnail_path = out_dir.join(format!("{}_64.webp", stem));
    let full_path = out_dir.join(format!("{}_512.webp", stem));
    tokio::fs::write(&thumbnail_path, &variants.thumbnail).await?;
    tokio::fs::write(&full_path, &variants.full).await?;

    info!(
        "Wrote {} and {}",
        thumbnail_path.display(),
        full_path.display()
    );
    Ok(())
}

async fn upload(
    config: &Config,
    processor: AvatarProcessor,
    input: &Path,
    owner: AvatarOwner,
    name: &str,
) -> avatar_pipeline::Result<()> {
    let store: Arc<dyn ObjectStore> = if config.dry_run {
        info!("DRY_RUN enabled, uploads stay in memory");
        Arc::new(MockObjectStore::new().with_base_url(config.s3_base_url.clone()))
    } else {
        let (access_key_id, secret_access_key) = config.s3_credentials()?;
        Arc::new(
            S3ObjectStore::new(
                access_key_id,
                secret_access_key,
                config.s3_endpoint.clone(),
                config.s3_region.clone(),
                config.s3_bucket.clone(),
                config.s3_base_url.clone(),
            )
            .await?,
        )
    };

    let raw = tokio::fs::read(input).await?;
    let uploader = AvatarUploader::new(Arc::new(processor), store);
    let stored = uploader.upload(owner, name, &raw).await?;

    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}
