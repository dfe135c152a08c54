//! `aura` - thin command-line wrapper over [`aura_engine`].
//!
//! Results go to stdout as JSON, logs to stderr. Exit codes: 0 success,
//! 1 usage or input error, 2 verification failed, 3 unrecoverable breach.

mod crash_hardening;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use aura_config::EngineSettings;
use aura_core::{PublicVector, SealRecord, VectorPair};
use aura_engine::{
    EngineError, FileKeyStore, Orchestrator, PublicVectorsFile, VerificationOutcome,
};

const EXIT_OK: u8 = 0;
const EXIT_INPUT: u8 = 1;
const EXIT_VERIFICATION: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "aura", version)]
#[command(about = "Dual-vector sealing and self-healing integrity")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Derive and store a new identity
    Birth {
        /// At least 32 bytes of hex entropy; OS randomness when omitted
        #[arg(long)]
        entropy: Option<String>,
    },
    /// Show the active identity
    Info,
    /// Seal a file with the active identity
    Seal {
        payload: PathBuf,
        /// Write the record here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify a sealed file, healing through a surviving vector if needed
    Verify {
        payload: PathBuf,
        record: PathBuf,
        /// Public vectors file presented by the sealer
        #[arg(long, conflicts_with_all = ["alpha", "beta"])]
        vectors: Option<PathBuf>,
        /// Presented alpha vector (hex); defaults to the identity's own
        #[arg(long, value_parser = PublicVector::from_hex)]
        alpha: Option<PublicVector>,
        /// Presented beta vector (hex); defaults to the identity's own
        #[arg(long, value_parser = PublicVector::from_hex)]
        beta: Option<PublicVector>,
    },
    /// Pick the membership-valid vector of a pair
    Heal {
        #[arg(value_parser = PublicVector::from_hex)]
        known_good: PublicVector,
        #[arg(value_parser = PublicVector::from_hex)]
        candidate: PublicVector,
    },
    /// Write a protected reference frame
    Protect { payload: PathBuf, out: PathBuf },
    /// Detect, repair and re-validate a protected frame
    Recover { frame: PathBuf, out: PathBuf },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn orchestrator() -> Result<Orchestrator> {
    let settings = EngineSettings::load()?;
    let root = settings
        .store_root()
        .ok_or_else(|| anyhow!("cannot locate a key store; set AURA_HOME or [store].dir"))?;
    tracing::debug!(root = %root.display(), "Using key store");
    Ok(Orchestrator::new(settings, FileKeyStore::new(root))?)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn presented_vectors(
    vectors: Option<&Path>,
    alpha: Option<PublicVector>,
    beta: Option<PublicVector>,
    own: VectorPair,
) -> Result<VectorPair> {
    if let Some(path) = vectors {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let public: PublicVectorsFile = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a vectors file", path.display()))?;
        return Ok(public.vectors());
    }
    Ok(VectorPair {
        alpha: alpha.unwrap_or(own.alpha),
        beta: beta.unwrap_or(own.beta),
    })
}

fn run(command: Command) -> Result<u8> {
    match command {
        Command::Birth { entropy } => {
            let orch = orchestrator()?;
            let session = match entropy {
                Some(raw) => {
                    let entropy = hex::decode(raw.trim()).context("--entropy is not hex")?;
                    orch.birth(&entropy)?
                }
                None => orch.birth_random()?,
            };
            print_json(&orch.identity_info(&session))?;
        }
        Command::Info => {
            let orch = orchestrator()?;
            let session = orch.load_or_birth()?;
            print_json(&orch.identity_info(&session))?;
        }
        Command::Seal { payload, out } => {
            let payload = read(&payload)?;
            let orch = orchestrator()?;
            let mut session = orch.load_or_birth()?;
            let record = orch.seal(&mut session, &payload)?;
            let json = record.to_json()?;
            match out {
                Some(out) => write(&out, json.as_bytes())?,
                None => println!("{json}"),
            }
        }
        Command::Verify {
            payload,
            record,
            vectors,
            alpha,
            beta,
        } => {
            let payload = read(&payload)?;
            let raw = fs::read_to_string(&record)
                .with_context(|| format!("failed to read {}", record.display()))?;
            let record = SealRecord::from_json(&raw)?;

            let orch = orchestrator()?;
            let mut session = orch.load_or_birth()?;
            let presented = presented_vectors(vectors.as_deref(), alpha, beta, *session.vectors())?;
            let outcome = orch.verify(&mut session, &presented, &payload, &record)?;
            let code = match outcome {
                VerificationOutcome::Verified => {
                    println!("verified");
                    EXIT_OK
                }
                VerificationOutcome::Healed {
                    role, confidence, ..
                } => {
                    println!("verified after healing through {role} (confidence {confidence:.4})");
                    EXIT_OK
                }
                VerificationOutcome::Rejected => {
                    println!("rejected");
                    EXIT_VERIFICATION
                }
            };
            return Ok(code);
        }
        Command::Heal {
            known_good,
            candidate,
        } => {
            let recovered = orchestrator()?.heal(&known_good, &candidate)?;
            print_json(&recovered)?;
        }
        Command::Protect { payload, out } => {
            let framed = orchestrator()?.protect_reference(&read(&payload)?)?;
            write(&out, &framed)?;
        }
        Command::Recover { frame, out } => {
            let recovered = orchestrator()?.recover_reference(&read(&frame)?)?;
            write(&out, &recovered.payload)?;
            println!(
                "recovered {} bytes (confidence {:.4}, repaired segments {:?})",
                recovered.payload.len(),
                recovered.recovery_confidence,
                recovered.repaired_segments
            );
        }
    }
    Ok(EXIT_OK)
}

/// Help and version requests succeed; every other parse failure is a usage
/// error.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() { EXIT_INPUT } else { EXIT_OK }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };

    init_tracing();

    if let Err(err) = crash_hardening::apply() {
        eprintln!("Error: {err:#}");
        return ExitCode::from(EXIT_INPUT);
    }

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            err.downcast_ref::<EngineError>()
                .map_or(EXIT_INPUT, EngineError::exit_code)
        }
    };
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::{CommandFactory, Parser};

    use super::{Cli, Command, usage_exit_code};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("aura").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn seal_takes_payload_and_optional_out() {
        let cli = parse(&["seal", "p.bin", "--out", "r.json"]).unwrap();
        let Command::Seal { payload, out } = cli.command else {
            panic!("expected seal");
        };
        assert_eq!(payload, PathBuf::from("p.bin"));
        assert_eq!(out, Some(PathBuf::from("r.json")));
    }

    #[test]
    fn out_value_does_not_stand_in_for_the_payload() {
        let err = parse(&["seal", "--out", "payload.bin"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn double_dash_escapes_flag_like_paths() {
        let cli = parse(&["seal", "--", "--odd-name"]).unwrap();
        let Command::Seal { payload, .. } = cli.command else {
            panic!("expected seal");
        };
        assert_eq!(payload, PathBuf::from("--odd-name"));
    }

    #[test]
    fn unknown_flags_and_conflicts_are_rejected() {
        let err = parse(&["info", "--frobnicate"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);

        let hex = "00".repeat(32);
        let err = parse(&["verify", "p", "r", "--vectors", "v.json", "--alpha", &hex]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn vectors_are_parsed_as_hex() {
        let hex = "ab".repeat(32);
        let cli = parse(&["heal", &hex, &hex]).unwrap();
        let Command::Heal { known_good, candidate } = cli.command else {
            panic!("expected heal");
        };
        assert_eq!(known_good, candidate);
        assert_eq!(known_good.to_hex(), hex);

        let err = parse(&["heal", "zz", &hex]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn help_exits_cleanly() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
        let err = parse(&[]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
    }
}
