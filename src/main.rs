use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use fshare::auth::{generate_api_key, hash_api_key};
use fshare::web::{AppState, WebServer};
use fshare::{
    CleanupScheduler, Config, CredentialService, Database, FileStorage, FshareError,
    ResourceService, SigningSecret, UrlSigner,
};

/// Self-hosted file sharing service.
#[derive(Debug, Parser)]
#[command(name = "fshare", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Register this API key on startup.
    #[arg(long)]
    api_key: Option<String>,

    /// Comment stored with the bootstrap key.
    #[arg(long, default_value = "")]
    comment: String,

    /// Mark the bootstrap key as highly trusted.
    #[arg(long)]
    highly_trusted: bool,
}

/// File the generated first-run key is written to.
const INIT_KEY_FILE: &str = "init_api_key";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = fshare::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        fshare::logging::init_console_only(&config.logging.level);
    }

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> fshare::Result<()> {
    info!("fshare starting");

    let db = Database::open(&config.database.path).await?;
    let storage = FileStorage::new(&config.storage.upload_path)?;
    info!(path = %storage.root().display(), "Upload root ready");

    let secret = SigningSecret::load_or_create(&config.signing.secret_path)?;
    let signer = UrlSigner::new(&secret)?;

    let credentials = CredentialService::new(db.clone());
    let resources = Arc::new(ResourceService::new(db, storage));

    bootstrap_credentials(&args, &config, &credentials, &resources).await?;

    let cleanup = if config.cleanup.enabled {
        let scheduler = CleanupScheduler::new(
            resources.clone(),
            Duration::from_secs(config.cleanup.interval_secs),
        );
        Some(scheduler.spawn())
    } else {
        info!("Cleanup scheduler disabled");
        None
    };

    let state = Arc::new(AppState::new(
        credentials,
        resources,
        signer,
        config.signing.link_ttl_secs,
    ));
    let server = WebServer::new(&config, state)?;

    let result = server.run(shutdown_signal()).await;

    if let Some(handle) = cleanup {
        handle.shutdown().await;
    }
    info!("fshare stopped");
    result
}

/// Register the key given on the command line, or generate a first key when
/// no credential exists yet.
async fn bootstrap_credentials(
    args: &Args,
    config: &Config,
    credentials: &CredentialService,
    resources: &ResourceService,
) -> fshare::Result<()> {
    if let Some(key) = &args.api_key {
        match credentials
            .register(key, &args.comment, args.highly_trusted, None)
            .await
        {
            Ok(_) | Err(FshareError::DuplicateCredential) => {}
            Err(e) => return Err(e),
        }
        resources.get_or_create_home(&hash_api_key(key)?).await?;
        return Ok(());
    }

    if credentials.exists().await? {
        return Ok(());
    }

    let key = generate_api_key();
    let credential = credentials
        .register(&key, "initial key", true, None)
        .await?;
    resources
        .get_or_create_home(&credential.hashed_secret)
        .await?;

    let data_dir = Path::new(&config.database.path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let key_path = data_dir.join(INIT_KEY_FILE);
    write_init_key(&key_path, &key)?;

    warn!(
        path = %key_path.display(),
        "No API key configured; generated a highly trusted key"
    );
    Ok(())
}

fn write_init_key(path: &Path, key: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    writeln!(file, "{key}")?;
    file.sync_all()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
