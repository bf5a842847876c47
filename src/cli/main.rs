use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, Command};
use ct_codecs::{Encoder, Hex};
use icekey::software::SoftwareSecureWorld;
use icekey::{
    data_unit_mask, CipherProfile, KeySlot, KeySlotManager, ProvisionError, StorageEngine,
    WrappedKey,
};
use std::path::Path;

/// The icekey-cli error type.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hex encoding error")]
    Hex,

    #[error("Usage error: {0}")]
    Usage(&'static str),
}

fn read_key_file(path: impl AsRef<Path>) -> Result<Vec<u8>, CliError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(CliError::Io)
}

fn hex(bytes: &[u8]) -> Result<String, CliError> {
    Hex::encode_to_string(bytes).map_err(|_| CliError::Hex)
}

fn engine_from_name(name: &str) -> Result<StorageEngine, CliError> {
    match name {
        "ufs" => Ok(StorageEngine::Ufs),
        "sdcc" => Ok(StorageEngine::Sdcc),
        "ufs-card" => Ok(StorageEngine::UfsCard),
        _ => Err(CliError::Usage("Unknown storage engine")),
    }
}

fn start() -> Result<(), CliError> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Prints debugging information"),
        )
        .subcommand(
            Command::new("wire")
                .about("Show the wire-format bytes a key would cross the trust boundary as")
                .arg(
                    Arg::new("in")
                        .value_name("key_file")
                        .long("input-file")
                        .short('i')
                        .required(true)
                        .help("Key file (raw bytes)"),
                )
                .arg(
                    Arg::new("hw_wrapped")
                        .long("hw-wrapped")
                        .action(ArgAction::SetTrue)
                        .help("Treat the key as already hardware-wrapped"),
                ),
        )
        .subcommand(
            Command::new("exercise")
                .about("Program and invalidate a key against the software secure world")
                .arg(
                    Arg::new("in")
                        .value_name("key_file")
                        .long("input-file")
                        .short('i')
                        .required(true)
                        .help("Key file (raw bytes)"),
                )
                .arg(
                    Arg::new("slot")
                        .long("slot")
                        .short('s')
                        .value_parser(clap::value_parser!(u32))
                        .default_value("0")
                        .help("Key slot index"),
                )
                .arg(
                    Arg::new("engine")
                        .long("engine")
                        .short('e')
                        .value_parser(["ufs", "sdcc", "ufs-card"])
                        .default_value("ufs")
                        .help("Storage engine owning the slot namespace"),
                )
                .arg(
                    Arg::new("data_unit_size")
                        .long("data-unit-size")
                        .value_name("BYTES")
                        .value_parser(clap::value_parser!(u32))
                        .action(ArgAction::Append)
                        .help("Data-unit size in bytes the key applies to (repeatable; default 4096)"),
                )
                .arg(
                    Arg::new("hw_wrapped")
                        .long("hw-wrapped")
                        .action(ArgAction::SetTrue)
                        .help("Treat the key as already hardware-wrapped"),
                ),
        )
        .subcommand(
            Command::new("secret")
                .about("Derive a raw secret from a wrapped key (truncating copy on this platform)")
                .arg(
                    Arg::new("in")
                        .value_name("key_file")
                        .long("input-file")
                        .short('i')
                        .required(true)
                        .help("Wrapped-key file (raw bytes)"),
                )
                .arg(
                    Arg::new("len")
                        .long("len")
                        .short('l')
                        .value_parser(clap::value_parser!(usize))
                        .default_value("32")
                        .help("Secret length in bytes"),
                ),
        )
        .get_matches();

    let debug = matches.get_flag("debug");

    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Some(matches) = matches.subcommand_matches("wire") {
        let input_file = matches
            .get_one::<String>("in")
            .ok_or(CliError::Usage("Missing key file"))?;
        let hw_wrapped = matches.get_flag("hw_wrapped");
        let raw = read_key_file(input_file)?;
        let key = WrappedKey::new(&raw, hw_wrapped)?;
        println!("Key:  {} ({} bytes)", hex(key.as_bytes())?, key.len());
        println!("Wire: {}", hex(&key.wire_bytes())?);
    } else if let Some(matches) = matches.subcommand_matches("exercise") {
        let input_file = matches
            .get_one::<String>("in")
            .ok_or(CliError::Usage("Missing key file"))?;
        let slot = KeySlot(*matches.get_one::<u32>("slot").unwrap_or(&0));
        let engine = matches
            .get_one::<String>("engine")
            .map(|s| engine_from_name(s))
            .unwrap_or(Ok(StorageEngine::Ufs))?;
        let sizes: Vec<u32> = matches
            .get_many::<u32>("data_unit_size")
            .map(|values| values.copied().collect())
            .unwrap_or_else(|| vec![4096]);
        let hw_wrapped = matches.get_flag("hw_wrapped");

        let raw = read_key_file(input_file)?;
        let key = WrappedKey::new(&raw, hw_wrapped)?;
        let profile = CipherProfile::xts_aes_256(data_unit_mask(&sizes));

        let world = SoftwareSecureWorld::new();
        let manager = KeySlotManager::new(Box::new(world.monitor()), Box::new(world.bridge()));

        manager.program_key(&key, slot, &profile, engine)?;
        match world.programmed(engine, slot) {
            Some(programmed) => {
                println!("Slot {} programmed ({} bytes)", slot.0, programmed.len());
                println!("  wire bytes: {}", hex(&programmed)?);
            }
            None => return Err(CliError::Usage("Slot empty after programming")),
        }

        manager.invalidate_key(slot, engine)?;
        if world.programmed(engine, slot).is_none() {
            println!("Slot {} invalidated", slot.0);
        }
        println!("Outstanding regions: {}", world.outstanding_regions());
    } else if let Some(matches) = matches.subcommand_matches("secret") {
        let input_file = matches
            .get_one::<String>("in")
            .ok_or(CliError::Usage("Missing key file"))?;
        let len = *matches.get_one::<usize>("len").unwrap_or(&32);
        let wrapped = read_key_file(input_file)?;

        let world = SoftwareSecureWorld::new();
        let manager = KeySlotManager::new(Box::new(world.monitor()), Box::new(world.bridge()));
        let secret = manager.derive_raw_secret(&wrapped, len)?;
        println!("Secret ({} bytes): {}", secret.len(), hex(&secret)?);
    } else {
        return Err(CliError::Usage(
            "No subcommand given; try `wire`, `exercise` or `secret`",
        ));
    }
    Ok(())
}

fn main() {
    if let Err(e) = start() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
