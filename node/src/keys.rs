//! Local encrypted keyfile management, built on the same `eth-keystore` format `alloy`'s
//! `signer-keystore` feature uses.
//!
//! Grounded on `original_source/cmd/evml/commands/keys/*.go`: the keystore is entirely
//! a client-side concern (generate/inspect/update a keyfile) and never touches the
//! engine — clients sign transactions externally and submit raw RLP (`spec.md` §9,
//! Open Question 4). `alloy::signers::local::PrivateKeySigner` only encrypts a freshly
//! generated key, not an arbitrary one supplied by the caller, so `--privatekey` goes
//! through `eth_keystore::encrypt_key` directly (the same crate `PrivateKeySigner`
//! delegates to internally).

use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context};
use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum KeysCommand {
    /// Generate a new keyfile, or encrypt an existing raw private key into one.
    Generate(GenerateArgs),
    /// Decrypt a keyfile and print the address it controls.
    Inspect(InspectArgs),
    /// Re-encrypt a keyfile under a new passphrase.
    Update(UpdateArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Destination path for the new keyfile.
    pub keyfile: PathBuf,
    /// File containing a raw private key to encrypt, instead of generating a random one.
    #[arg(long)]
    pub privatekey: Option<PathBuf>,
    /// File containing the passphrase to encrypt the keyfile with.
    #[arg(long)]
    pub passfile: PathBuf,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    pub keyfile: PathBuf,
    #[arg(long)]
    pub passfile: PathBuf,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub keyfile: PathBuf,
    #[arg(long)]
    pub passfile: PathBuf,
    #[arg(long)]
    pub new_passfile: PathBuf,
}

fn read_passphrase(path: &Path) -> anyhow::Result<String> {
    Ok(fs::read_to_string(path)
        .with_context(|| format!("reading passphrase file {}", path.display()))?
        .trim_end()
        .to_string())
}

fn address_of(key_bytes: &[u8]) -> anyhow::Result<Address> {
    let signer = PrivateKeySigner::from_bytes(&B256::from_slice(key_bytes))
        .context("malformed secp256k1 key")?;
    Ok(signer.address())
}

/// Writes `key_bytes` to `keyfile` encrypted under `password`, in the same directory and
/// filename the caller asked for (`eth_keystore::encrypt_key` otherwise names the file
/// after a generated UUID, which would not match `original_source`'s `generate [keyfile]`
/// positional argument).
fn write_keystore(keyfile: &Path, key_bytes: &[u8], password: &str) -> anyhow::Result<()> {
    let dir = keyfile
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_name = eth_keystore::encrypt_key(dir, &mut rand::thread_rng(), key_bytes, password, None)
        .context("encrypting keyfile")?;
    let tmp_path = dir.join(&tmp_name);
    if tmp_path != keyfile {
        fs::rename(&tmp_path, keyfile)
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), keyfile.display()))?;
    }
    Ok(())
}

pub fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    if args.keyfile.exists() {
        bail!("keyfile already exists at {}", args.keyfile.display());
    }
    let password = read_passphrase(&args.passfile)?;

    let key_bytes: Vec<u8> = match &args.privatekey {
        Some(path) => {
            let hex_str = fs::read_to_string(path)
                .with_context(|| format!("reading private key file {}", path.display()))?;
            hex::decode(hex_str.trim().trim_start_matches("0x"))
                .context("private key file was not valid hex")?
        }
        None => PrivateKeySigner::random().to_bytes().to_vec(),
    };

    let address = address_of(&key_bytes)?;
    write_keystore(&args.keyfile, &key_bytes, &password)?;

    println!("Address: {address}");
    println!("Keyfile: {}", args.keyfile.display());
    Ok(())
}

pub fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let password = read_passphrase(&args.passfile)?;
    let key_bytes = eth_keystore::decrypt_key(&args.keyfile, password).context("decrypting keyfile")?;
    println!("Address: {}", address_of(&key_bytes)?);
    Ok(())
}

pub fn update(args: UpdateArgs) -> anyhow::Result<()> {
    let old_password = read_passphrase(&args.passfile)?;
    let new_password = read_passphrase(&args.new_passfile)?;
    let key_bytes = eth_keystore::decrypt_key(&args.keyfile, old_password)
        .context("decrypting keyfile with the current passphrase")?;

    write_keystore(&args.keyfile, &key_bytes, &new_password)?;

    println!("Address: {}", address_of(&key_bytes)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_inspect_round_trips_the_address() {
        let dir = tempfile::tempdir().unwrap();
        let keyfile = dir.path().join("keyfile.json");
        let passfile = dir.path().join("pass.txt");
        fs::write(&passfile, "hunter2\n").unwrap();

        generate(GenerateArgs {
            keyfile: keyfile.clone(),
            privatekey: None,
            passfile: passfile.clone(),
        })
        .unwrap();
        assert!(keyfile.exists());

        inspect(InspectArgs {
            keyfile,
            passfile,
        })
        .unwrap();
    }

    #[test]
    fn generate_refuses_to_overwrite_an_existing_keyfile() {
        let dir = tempfile::tempdir().unwrap();
        let keyfile = dir.path().join("keyfile.json");
        fs::write(&keyfile, "{}").unwrap();
        let passfile = dir.path().join("pass.txt");
        fs::write(&passfile, "hunter2\n").unwrap();

        let result = generate(GenerateArgs {
            keyfile,
            privatekey: None,
            passfile,
        });
        assert!(result.is_err());
    }
}
