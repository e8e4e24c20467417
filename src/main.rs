//! cactl CLI application.
//!
//! This binary manages the CAs, servers, clients and email identities of a
//! small private PKI, and exports them as ready-to-use configuration.

use cactl::backend::{RcgenBackend, SigningBackend};
use cactl::error::Result;
use cactl::export::{build_exporters, find_exporter};
use cactl::model::{Entity, EntityKind, RevocationReason};
use cactl::storage::PkiStore;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cactl")]
#[command(about = "Manage a small private PKI and export ready-to-use configs", long_about = None)]
struct Cli {
    /// Store directory
    #[arg(short = 'D', long, global = true, default_value = "./CA")]
    db_path: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a self-signed root CA
    NewRootCa {
        name: String,
    },

    /// Create an intermediate CA
    NewIntermediateCa {
        name: String,

        /// Signing CA (default: the first root CA)
        #[arg(long)]
        parent_ca: Option<String>,
    },

    /// Create a server certificate for a hostname
    NewServer {
        hostname: String,

        /// Signing CA (default: the first root CA)
        #[arg(long)]
        with_intermediate_ca: Option<String>,
    },

    /// Create a client certificate
    NewClient {
        name: String,

        /// Signing CA (default: the first root CA)
        #[arg(long)]
        with_intermediate_ca: Option<String>,
    },

    /// Create an email identity certificate
    NewEmail {
        address: String,

        /// Signing CA (default: the first root CA)
        #[arg(long)]
        with_intermediate_ca: Option<String>,
    },

    /// List all entities
    Ls,

    /// List known exporters
    LsExporters,

    /// Export an entity as a ready-to-use config
    Export {
        entity: String,
        exporter: String,
        path: PathBuf,
    },

    /// Revoke every valid certificate of an entity
    Revoke {
        entity: String,

        /// unspecified, key-compromise, ca-compromise, affiliation-changed,
        /// superseded or cessation-of-operation
        #[arg(long, default_value = "unspecified")]
        reason: RevocationReason,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut store = PkiStore::open(&cli.db_path)?;
    let backend = RcgenBackend::from_config(store.directory(), store.config());
    debug!("Using store at {}", store.path().display());

    let ca_strength = store.config().ca_min_strength;
    let leaf_strength = store.config().leaf_min_strength;

    match cli.command {
        Commands::NewRootCa { name } => {
            store.add_root_ca(Entity::root_ca(&name, ca_strength))?;
            issue(&mut store, &backend, &name)
        }

        Commands::NewIntermediateCa { name, parent_ca } => {
            let parent = signing_ca(&store, parent_ca)?;
            store.add_intermediate_ca(Entity::intermediate_ca(&name, &parent, ca_strength))?;
            issue(&mut store, &backend, &name)
        }

        Commands::NewServer {
            hostname,
            with_intermediate_ca,
        } => {
            let parent = signing_ca(&store, with_intermediate_ca)?;
            store.add_server(Entity::leaf(&hostname, &parent, leaf_strength))?;
            issue(&mut store, &backend, &hostname)
        }

        Commands::NewClient {
            name,
            with_intermediate_ca,
        } => {
            let parent = signing_ca(&store, with_intermediate_ca)?;
            store.add_client(Entity::leaf(&name, &parent, leaf_strength))?;
            issue(&mut store, &backend, &name)
        }

        Commands::NewEmail {
            address,
            with_intermediate_ca,
        } => {
            let parent = signing_ca(&store, with_intermediate_ca)?;
            store.add_email(Entity::leaf(&address, &parent, leaf_strength))?;
            issue(&mut store, &backend, &address)
        }

        Commands::Ls => {
            list_entities(&store);
            Ok(())
        }

        Commands::LsExporters => {
            for exporter in build_exporters() {
                println!("{:<16} {}", exporter.name(), exporter.description());
            }
            Ok(())
        }

        Commands::Export {
            entity,
            exporter,
            path,
        } => {
            let exporter = find_exporter(&exporter)?;
            let files = exporter.export(&mut store, &backend, &entity, &path)?;

            println!("✓ Exported '{}' with {}", entity, exporter.name());
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }

        Commands::Revoke { entity, reason } => {
            let revocations = store.revoke_entity(&entity, reason)?;
            for revocation in revocations {
                println!(
                    "✓ Revoked certificate {} of '{}' ({})",
                    revocation.cert_id, entity, revocation.reason
                );
            }
            Ok(())
        }
    }
}

/// The explicitly chosen CA, or the default signing CA.
fn signing_ca(store: &PkiStore, requested: Option<String>) -> Result<String> {
    match requested {
        Some(name) => Ok(name),
        None => Ok(store.default_signing_ca()?.name.clone()),
    }
}

fn issue(store: &mut PkiStore, backend: &dyn SigningBackend, name: &str) -> Result<()> {
    let cert = store.get_or_create_cert(backend, name, None)?;
    let issuer = store.issuer_of(name)?;

    println!("✓ Created '{}'", name);
    println!("  Certificate: {}", store.resolve(&cert.path).display());
    println!("  Signed by: {}", issuer);
    println!("  Valid until: {}", cert.end_date.format("%Y-%m-%d"));
    Ok(())
}

fn list_entities(store: &PkiStore) {
    let now = Utc::now();
    let mut empty = true;

    for kind in EntityKind::ALL {
        let names = store.names(kind);
        if names.is_empty() {
            continue;
        }
        empty = false;

        println!("{}s:", kind);
        for name in names {
            let Some(entity) = store.get_entity(name) else {
                continue;
            };
            let revoked = store
                .issuer_of(name)
                .ok()
                .and_then(|issuer| store.get_entity(&issuer))
                .map(|ca| ca.revoked_cert_ids())
                .unwrap_or_default();

            let valid = entity
                .certs
                .iter()
                .filter(|c| c.is_valid_at(now) && !revoked.contains(c.id.as_str()))
                .count();
            let parent = entity
                .parent_id
                .as_deref()
                .map(|p| format!(" (signed by {})", p))
                .unwrap_or_default();

            println!("  {:<32} {} valid cert(s){}", entity.name, valid, parent);
        }
    }

    if empty {
        println!("No entities in {}", store.path().display());
    }
}
