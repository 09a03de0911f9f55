//! ledgerca CLI - provision the PKI of a ledger test network.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ledgerca::{
    bootstrap_ca, describe_ca, run_batch, BatchConfig, CaConfig, FailurePolicy, LeafConfig,
    LinkStyle, NativeSigner, OpensslSigner, SigningService,
};
use ledgerca_core::{Identity, KeyMethod, Role, Topology, DEFAULT_CA_LINK};

/// ledgerca - root CA and leaf certificates for ledger test networks
#[derive(Parser)]
#[command(name = "ledgerca")]
#[command(about = "Provision CA-signed certificates for a ledger test network", long_about = None)]
struct Cli {
    /// Key method
    #[arg(long, global = true, default_value = "ecc")]
    method: KeyMethod,

    /// Directory where the CA is stored
    #[arg(long, global = true, default_value = "./CA")]
    ca_dir: PathBuf,

    /// Base name of the CA files
    #[arg(long, global = true, default_value = "localhostCA")]
    ca_filename: String,

    /// Passphrase of the CA private key (dsa only)
    #[arg(long, global = true, default_value = "unsafe dsa_password")]
    dsa_password: String,

    /// openssl request config used for the CA and every CSR
    #[arg(long, global = true)]
    ca_config: Option<PathBuf>,

    /// Subject of the CA certificate
    #[arg(long, global = true, default_value = ledgerca::config::DEFAULT_CA_SUBJECT)]
    ca_subject: String,

    /// Signing backend
    #[arg(long, global = true, value_enum, default_value_t = Backend::Native)]
    backend: Backend,

    /// openssl executable (openssl backend)
    #[arg(long, global = true, default_value = "openssl")]
    openssl: String,

    /// Kill openssl commands running longer than this many seconds
    #[arg(long, global = true)]
    command_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process rcgen signer (ecc only)
    Native,
    /// External openssl executable
    Openssl,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or recreate) the root CA
    Ca,

    /// Show the CA certificate
    List,

    /// Issue a certificate for one identity
    Auth {
        /// Directory where the certificate is stored
        #[arg(long, default_value = "./cert")]
        dir: PathBuf,

        /// Base name of the certificate files
        #[arg(long, default_value = "client")]
        name: String,

        /// Role tag used for the {role} subject placeholder
        #[arg(long, default_value = "client")]
        role: Role,

        /// File name of the link to the CA certificate
        #[arg(long, default_value = DEFAULT_CA_LINK)]
        ca_link: String,

        #[command(flatten)]
        leaf: LeafArgs,
    },

    /// Issue certificates for every identity of the topology
    All {
        #[command(flatten)]
        selection: TopologyArgs,

        /// Recreate the root CA first
        #[arg(long)]
        regenerate_ca: bool,

        /// Stop at the first signing failure
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        leaf: LeafArgs,
    },

    /// Print the topology table
    Topology {
        #[command(flatten)]
        selection: TopologyArgs,
    },
}

#[derive(Args)]
struct LeafArgs {
    /// Extension file of the certificate generation
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leaf subject template ({name} and {role} are substituted);
    /// defaults to the CA subject plus /CN={name}
    #[arg(long)]
    subject: Option<String>,

    /// Use the shortest link path when one directory contains the other
    #[arg(long)]
    shortest_links: bool,
}

#[derive(Args)]
struct TopologyArgs {
    /// Root the topology directories are relative to
    #[arg(long, default_value = "../..")]
    root: PathBuf,

    /// JSON topology file instead of the built-in table
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Only identities whose directory starts with this prefix
    #[arg(long)]
    env: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ledgerca=info".parse().unwrap()))
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "aborted");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let ca = CaConfig {
        dir: cli.ca_dir.clone(),
        filename: cli.ca_filename.clone(),
        method: cli.method,
        passphrase: cli.dsa_password.clone(),
        subject: cli.ca_subject.clone(),
        request_config: cli.ca_config.clone(),
    };
    let signer = build_signer(&cli);

    match cli.command {
        Commands::Ca => {
            let files = bootstrap_ca(signer.as_ref(), &ca).await?;
            println!("{}", files.cert.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            println!("{}", describe_ca(&ca)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Auth {
            dir,
            name,
            role,
            ca_link,
            leaf,
        } => {
            let identity = Identity::new(role, dir).with_name(name).with_ca_link(ca_link);
            let config = BatchConfig {
                leaf: leaf.into_config(&ca),
                ca,
                regenerate_ca: false,
                failure_policy: FailurePolicy::Strict,
            };
            issue(signer.as_ref(), &config, &Topology::new(vec![identity])).await
        }
        Commands::All {
            selection,
            regenerate_ca,
            strict,
            leaf,
        } => {
            let topology = selection.load()?;
            let config = BatchConfig {
                leaf: leaf.into_config(&ca),
                ca,
                regenerate_ca,
                failure_policy: if strict {
                    FailurePolicy::Strict
                } else {
                    FailurePolicy::BestEffort
                },
            };
            issue(signer.as_ref(), &config, &topology).await
        }
        Commands::Topology { selection } => {
            let topology = selection.load()?;
            println!("{:<8}  {}", "ROLE", "DIRECTORY");
            println!("{}", "-".repeat(60));
            for identity in &topology {
                println!("{:<8}  {}", identity.role, identity.dir.display());
            }
            println!("\n{} identities", topology.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_signer(cli: &Cli) -> Box<dyn SigningService> {
    match cli.backend {
        Backend::Native => Box::new(NativeSigner::new()),
        Backend::Openssl => {
            let signer = OpensslSigner::new(cli.openssl.clone());
            match cli.command_timeout {
                Some(secs) => Box::new(signer.with_timeout(Duration::from_secs(secs))),
                None => Box::new(signer),
            }
        }
    }
}

async fn issue(
    signer: &dyn SigningService,
    config: &BatchConfig,
    topology: &Topology,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let report = run_batch(signer, config, topology).await?;
    for identity in &report.issued {
        println!("{}", identity.dir.display());
    }
    println!("{report}");

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

impl LeafArgs {
    fn into_config(self, ca: &CaConfig) -> LeafConfig {
        LeafConfig {
            subject: self
                .subject
                .unwrap_or_else(|| format!("{}/CN={{name}}", ca.subject)),
            extensions: self.config,
            link_style: if self.shortest_links {
                LinkStyle::Shortest
            } else {
                LinkStyle::Legacy
            },
        }
    }
}

impl TopologyArgs {
    fn load(&self) -> Result<Topology, Box<dyn std::error::Error>> {
        let topology = match &self.topology {
            Some(path) => Topology::from_json(&std::fs::read_to_string(path)?)?,
            None => Topology::builtin(),
        };
        let topology = match &self.env {
            Some(prefix) => topology.environment(prefix),
            None => topology,
        };
        Ok(topology.rooted(&self.root))
    }
}
