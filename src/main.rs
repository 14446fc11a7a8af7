use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vault::cli::{
    handle_audit_command, handle_key_list, handle_keygen, handle_open, handle_seal, AuditCommands,
    KeygenArgs, OpenArgs, SealArgs,
};
use vault::config::{Settings, VaultPaths};
use vault::kms::RemoteKeyWrapper;

#[derive(Parser)]
#[command(
    name = "vault",
    version,
    about = "Envelope encryption and tamper-evident audit ledger",
    long_about = "vault seals files into self-describing envelopes, with data keys \
                  wrapped either under a local RSA key pair or by a remote key \
                  custodian, and keeps a hash-chained audit ledger per tenant."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and store a local key pair
    Keygen(KeygenArgs),

    /// List stored key pairs
    Keys,

    /// Seal a payload into an envelope
    Seal(SealArgs),

    /// Open an envelope
    Open(OpenArgs),

    /// Audit ledger commands
    #[command(subcommand)]
    Audit(AuditCommands),

    /// Probe the remote key custodian
    Health,

    /// Write default settings and create directories
    Init,

    /// Show current configuration and paths
    Config,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = VaultPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Some(Commands::Keygen(args)) => handle_keygen(&paths, &settings, args)?,
        Some(Commands::Keys) => handle_key_list(&paths, &settings)?,
        Some(Commands::Seal(args)) => handle_seal(&paths, &settings, args).await?,
        Some(Commands::Open(args)) => handle_open(&paths, &settings, args).await?,
        Some(Commands::Audit(cmd)) => handle_audit_command(&paths, cmd)?,
        Some(Commands::Health) => match RemoteKeyWrapper::from_settings(&settings)? {
            Some(remote) => {
                remote.health_check().await?;
                println!("Key custodian is reachable.");
            }
            None => {
                anyhow::bail!("no KMS endpoint configured (set kms.endpoint in config.json)");
            }
        },
        Some(Commands::Init) => {
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialized vault at: {}", paths.base_dir().display());
        }
        Some(Commands::Config) => {
            println!("Vault Configuration");
            println!("===================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Settings file:  {}", paths.settings_file().display());
            println!("Audit ledger:   {}", paths.audit_log().display());
            println!("Key directory:  {}", paths.keys_dir().display());
            println!();
            println!("Settings:");
            println!(
                "  KMS endpoint:     {}",
                settings.kms.endpoint.as_deref().unwrap_or("(not configured)")
            );
            println!("  KMS key path:     {}", settings.kms.key_path);
            println!(
                "  KMS key version:  {}",
                settings.kms.default_key_version.as_deref().unwrap_or("primary")
            );
            println!("  KMS timeout:      {} ms", settings.kms.timeout_ms);
            println!(
                "  Retry:            {} attempts, {}-{} ms backoff",
                settings.retry.max_attempts, settings.retry.base_delay_ms, settings.retry.max_delay_ms
            );
            println!("  Local key size:   {}", settings.local.key_bits);
        }
        None => {
            println!("vault - envelope encryption and audit ledger");
            println!();
            println!("Run 'vault --help' for usage information.");
        }
    }

    Ok(())
}
