//! Key pair CLI commands

use clap::Args;

use super::{key_store, PassphraseArgs};
use crate::config::{Settings, VaultPaths};
use crate::crypto::{generate_key_pair, KeySize};
use crate::error::{VaultError, VaultResult};

/// Arguments for `vault keygen`
#[derive(Args)]
pub struct KeygenArgs {
    /// Name of the key pair (letters, digits, '-' and '_')
    pub name: String,

    /// RSA modulus size: 2048 or 4096 (defaults to the configured size)
    #[arg(long)]
    pub bits: Option<usize>,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// Generate and store a passphrase-protected key pair
pub fn handle_keygen(paths: &VaultPaths, settings: &Settings, args: KeygenArgs) -> VaultResult<()> {
    let size = match args.bits {
        Some(bits) => KeySize::try_from(bits)?,
        None => settings.local.key_bits,
    };

    let store = key_store(paths, settings);
    if store.exists(&args.name) {
        return Err(VaultError::validation(format!(
            "Key pair '{}' already exists",
            args.name
        )));
    }

    let passphrase = args.passphrase.resolve(true)?;
    passphrase.check_strength()?;

    eprintln!("Generating {} key pair...", size);
    let pair = generate_key_pair(size)?;
    store.save(&args.name, &pair, passphrase.expose())?;

    println!("Created key pair '{}' ({})", args.name, size);
    println!("  Public key:  {}", store.dir().join(format!("{}.pub.pem", args.name)).display());
    println!("  Private key: {}", store.dir().join(format!("{}.key.json", args.name)).display());

    Ok(())
}

/// List stored key pairs
pub fn handle_key_list(paths: &VaultPaths, settings: &Settings) -> VaultResult<()> {
    let names = key_store(paths, settings).list()?;

    if names.is_empty() {
        println!("No key pairs found.");
        println!("Run 'vault keygen <name>' to create one.");
        return Ok(());
    }

    for name in names {
        println!("{}", name);
    }
    Ok(())
}
