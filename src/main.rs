//! `nxoobctl`: run one command against an OOB module.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nxoob::format::render_lines;
use nxoob::{Client, CommandKind, ConfigKey, Error, Route, ServerTrust, Target};

const AFTER_HELP: &str = "\
Available --commands:
    get_config       Get target configuration
    set_config       Set target configuration (arg: key=value[,key=value...])
    reboot           Reboot target system
    set_certificate  Install client certificate (arg: path to PEM certificate)

Example:
    Read configuration:
    $ nxoobctl --uri wss://192.168.0.11:55688 --key cert.key --cert cert.pub -c get_config

    Install a client certificate on a provisioned certificate module:
    $ nxoobctl --uri wss://192.168.0.11:55688 --key cert.key --cert cert.pub \\
          --cert-app-guid <guid> --cert-module <module> -c set_certificate new.pub

    Change DNS and NTP:
    $ nxoobctl --uri wss://192.168.0.11:55688 --key cert.key --cert cert.pub \\
          -c set_config DNS=1.1.1.1,NTP=0.pool.ntp.org

Return value:
0 for success, 1 for failure";

/// OOB module control.
#[derive(Debug, Parser)]
#[command(name = "nxoobctl", version, after_help = AFTER_HELP)]
struct Cli {
    /// Target uri (wss://[ip]:[port]).
    #[arg(long)]
    uri: String,

    /// Command to run on target.
    #[arg(short, long)]
    command: String,

    /// Command argument (set_config: key=value list, set_certificate: certificate file).
    arg: Option<String>,

    /// Client private key (PEM) for mutual TLS. Requires --cert.
    #[arg(long)]
    key: Option<PathBuf>,

    /// Client certificate (PEM) for mutual TLS. Requires --key.
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Verify the module's certificate against this CA bundle (PEM).
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Application GUID that receives set_certificate. Requires --cert-module.
    #[arg(long, requires = "cert_module")]
    cert_app_guid: Option<String>,

    /// Module name that receives set_certificate. Requires --cert-app-guid.
    #[arg(long, requires = "cert_app_guid")]
    cert_module: Option<String>,

    /// Trace every frame sent and received.
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            if let Error::Validation(_) = e {
                let keys: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
                eprintln!("recognized keys: {}", keys.join(", "));
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    nxoob::debug::set_enabled(debug);

    let filter = if debug {
        EnvFilter::new("nxoob=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nxoob=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> nxoob::Result<()> {
    let kind: CommandKind = cli.command.parse()?;
    let command = kind.build(cli.arg.as_deref())?;

    let mut builder = Client::builder(cli.uri.as_str());
    if let Some(target) = certificate_target(&cli) {
        builder = builder.target(Route::Certificate, target);
    }
    if let Some(path) = &cli.cert {
        builder = builder.client_cert_pem(read(path)?);
    }
    if let Some(path) = &cli.key {
        builder = builder.client_key_pem(read(path)?);
    }
    if let Some(path) = &cli.ca {
        builder = builder.server_trust(ServerTrust::CaPem(read(path)?));
    }
    let client = builder.build()?;

    let pairs = client.run(&command).await?;

    let mut stdout = io::stdout().lock();
    for line in render_lines(&pairs) {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;
    Ok(())
}

fn certificate_target(cli: &Cli) -> Option<Target> {
    match (&cli.cert_app_guid, &cli.cert_module) {
        (Some(guid), Some(module)) => Some(Target::new(guid.as_str(), module.as_str())),
        _ => None,
    }
}

fn read(path: &Path) -> nxoob::Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })
}
