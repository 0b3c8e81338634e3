use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bank_ledger::{
    config::BankConfig,
    contracts::{Call, Transactor},
    identity::Signer,
    ledger::Bank,
    store::Deployment,
    units::Wei,
    Accounts,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bank", version, about = "Owner-gated custodial ledger", long_about = None)]
struct Cli {
    /// Deployment state file
    #[arg(long, global = true, default_value = "bank.state.json", value_name = "FILE")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy a new bank owned by a freshly generated signer
    Deploy {
        /// JSON config file (missing file means defaults)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Name under which the owner's key is stored
        #[arg(long, default_value = "owner")]
        name: String,
    },
    /// Generate and store a named signer
    Keygen {
        #[arg(long)]
        name: String,
    },
    /// Credit an external account (test faucet)
    Fund {
        #[arg(long)]
        name: String,
        /// Amount in ether
        #[arg(long, value_parser = parse_ether)]
        value: Wei,
    },
    /// Deposit the attached value into the bank
    Deposit {
        #[arg(long)]
        from: String,
        /// Attached value in ether
        #[arg(long, value_parser = parse_ether)]
        value: Wei,
    },
    /// Withdraw from the bank to the caller
    Withdraw {
        #[arg(long)]
        from: String,
        /// Amount in ether
        #[arg(long, value_parser = parse_ether)]
        amount: Wei,
    },
    /// Print the owner address
    Owner,
    /// Print the bank balance, or an external account balance with --name
    Balance {
        #[arg(long)]
        name: Option<String>,
    },
    /// Print all committed events as JSON lines
    Events,
    /// Re-check the stored snapshot
    Verify,
}

fn parse_ether(s: &str) -> Result<Wei, String> {
    Wei::parse_ether(s).map_err(|e| e.to_string())
}

//==================== state helpers ====================//

struct Session {
    deployment: Deployment,
    transactor: Transactor,
}

impl Session {
    fn open(path: &Path) -> Result<Self> {
        let deployment = Deployment::load(path)
            .with_context(|| format!("no deployment at {} (run `bank deploy`)", path.display()))?;
        let transactor = deployment.transactor()?;
        Ok(Self {
            deployment,
            transactor,
        })
    }

    fn signer(&self, name: &str) -> Result<Signer> {
        Ok(self.deployment.signer(name)?)
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.deployment.record(&self.transactor);
        Ok(self.deployment.save(path)?)
    }
}

//==================== commands ====================//

fn deploy_cmd(state: &Path, config: Option<&Path>, name: &str) -> Result<()> {
    if state.exists() {
        bail!("{} already holds a deployment", state.display());
    }
    let config = match config {
        Some(path) => BankConfig::load(path)?,
        None => BankConfig::default(),
    }
    .with_env_overrides()?;

    let owner = Signer::generate();
    let bank = Bank::deploy(owner.address(), config);
    let mut deployment = Deployment::new(&bank, Accounts::new());
    deployment.add_signer(name, &owner)?;
    deployment.save(state)?;

    println!("bank deployed, owner {} ({name})", owner.address());
    println!("minimum deposit {} ether", bank.minimum_deposit().format_ether());
    Ok(())
}

fn keygen_cmd(state: &Path, name: &str) -> Result<()> {
    let mut deployment = Deployment::load(state)?;
    let signer = Signer::generate();
    deployment.add_signer(name, &signer)?;
    deployment.save(state)?;
    println!("{name} → {}", signer.address());
    Ok(())
}

fn fund_cmd(state: &Path, name: &str, value: Wei) -> Result<()> {
    let mut session = Session::open(state)?;
    let address = session.signer(name)?.address();
    session.transactor.accounts_mut().credit(&address, value)?;
    session.save(state)?;
    tracing::info!(account = %address, value = %value, "account funded");
    println!(
        "{name} {} now holds {} ether",
        address,
        session
            .transactor
            .accounts()
            .balance_of(&address)
            .format_ether()
    );
    Ok(())
}

fn call_cmd(state: &Path, from: &str, call: impl FnOnce(u64) -> Call) -> Result<()> {
    let mut session = Session::open(state)?;
    let signer = session.signer(from)?;
    let signed = call(rand::random()).sign(&signer);
    let record = session.transactor.execute(&signed)?;
    session.save(state)?;
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}

fn balance_cmd(state: &Path, name: Option<&str>) -> Result<()> {
    let session = Session::open(state)?;
    let balance = match name {
        Some(name) => {
            let address = session.signer(name)?.address();
            session.transactor.accounts().balance_of(&address)
        }
        None => session.transactor.bank().balance(),
    };
    println!("{} ether ({} wei)", balance.format_ether(), balance);
    Ok(())
}

//==================== main ====================//

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state = cli.state.as_path();

    match cli.command {
        Commands::Deploy { config, name } => deploy_cmd(state, config.as_deref(), &name),
        Commands::Keygen { name } => keygen_cmd(state, &name),
        Commands::Fund { name, value } => fund_cmd(state, &name, value),
        Commands::Deposit { from, value } => {
            call_cmd(state, &from, |nonce| Call::deposit(value, nonce))
        }
        Commands::Withdraw { from, amount } => {
            call_cmd(state, &from, |nonce| Call::withdraw(amount, nonce))
        }
        Commands::Owner => {
            let session = Session::open(state)?;
            println!("{}", session.transactor.bank().owner());
            Ok(())
        }
        Commands::Balance { name } => balance_cmd(state, name.as_deref()),
        Commands::Events => {
            let session = Session::open(state)?;
            for record in session.transactor.bank().events() {
                println!("{}", serde_json::to_string(record)?);
            }
            Ok(())
        }
        Commands::Verify => {
            let session = Session::open(state)?;
            let snapshot = session.transactor.bank().snapshot();
            println!(
                "snapshot ok: {} events, root {}",
                snapshot.events.len(),
                hex::encode(snapshot.state_root)
            );
            Ok(())
        }
    }
}
