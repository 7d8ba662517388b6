use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use walrus_cli::config::{Config, Settings};
use walrus_cli::error::WalletResult;
use walrus_cli::flows::{self, SplitArgs, TxnArgs};
use walrus_cli::ledger::WalrusClient;
use walrus_cli::prompt::{read_seed, TerminalPrompt};
use walrus_cli::signer::device::open_attached_device;
use walrus_cli::signer::seed::{Seed, SeedSigner};
use walrus_cli::signer::{SignerSession, TransactionSigner};

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// host:port that the walrus API is running on [default: localhost:9380]
    #[clap(short = 'a', long, value_parser)]
    api_addr: Option<String>,

    /// use a 'hot' wallet driven by a 64-hex-character seed (see `seed`)
    #[clap(long, action)]
    hot: bool,

    /// path to optional YAML config file
    #[clap(long, value_parser)]
    config_path: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print version information
    Version,
    /// generate a random seed, printed as 64 hex characters
    ///
    /// Only this hex form is accepted by --hot, from WALRUS_SEED or the seed
    /// prompt. Word-list recovery phrases made by other walrus tools are not
    /// supported and cannot be used to restore their keys.
    Seed,
    /// view current balance
    Balance {
        /// exclude outputs of unconfirmed transactions
        #[clap(long, action)]
        confirmed_only: bool,
    },
    /// list addresses tracked by the wallet
    Addresses {
        /// also list up to this many recent transaction ids per address
        #[clap(long, value_parser, default_value_t = 0)]
        history: usize,
    },
    /// generate an address and add it to the wallet
    Addr {
        /// key index; defaults to the lowest unused index
        #[clap(value_parser)]
        index: Option<u64>,
    },
    /// create a transaction paying addr:amount pairs
    Txn {
        /// comma-separated addr:amount pairs, amounts in SC
        #[clap(value_parser)]
        outputs: String,
        /// where to write the transaction; may be omitted with --broadcast
        #[clap(value_parser)]
        file: Option<PathBuf>,
        /// sign the transaction
        #[clap(long, action)]
        sign: bool,
        /// broadcast the transaction
        #[clap(long, action)]
        broadcast: bool,
        /// use this change address instead of generating a new one
        #[clap(long, value_parser)]
        change: Option<String>,
    },
    /// create a transaction splitting wallet funds into equal outputs
    Split {
        #[clap(value_parser)]
        count: usize,
        /// value of each output, in SC
        #[clap(value_parser)]
        value: String,
        #[clap(value_parser)]
        file: Option<PathBuf>,
        #[clap(long, action)]
        sign: bool,
        #[clap(long, action)]
        broadcast: bool,
        #[clap(long, value_parser)]
        change: Option<String>,
    },
    /// sign a transaction file
    Sign {
        #[clap(value_parser)]
        file: PathBuf,
        /// broadcast instead of writing the signed file
        #[clap(long, action)]
        broadcast: bool,
    },
    /// broadcast a signed transaction file
    Broadcast {
        #[clap(value_parser)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let result = _main().await;
    if let Err(err) = result {
        if flows::is_cancellation(&err) {
            tracing::info!("aborted by user");
        } else {
            tracing::debug!("{:?}", err);
            eprintln!("{:#}", err);
        }
        std::process::exit(1);
    }
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    let Cli {
        api_addr,
        hot,
        config_path,
        command,
    } = Cli::parse();

    let config = config_path.as_deref().map(Config::load).transpose()?;
    let change_flag = match &command {
        Some(Command::Txn { change, .. }) | Some(Command::Split { change, .. }) => change.clone(),
        _ => None,
    };
    let settings = Settings::resolve(config, api_addr, hot, change_flag);

    let command = match command {
        Some(command) => command,
        None => Command::Version,
    };

    let mut prompt = TerminalPrompt::default();
    let hot = settings.hot;
    let mut signers = SignerSession::new(move || -> WalletResult<Box<dyn TransactionSigner>> {
        if hot {
            Ok(Box::new(SeedSigner::new(read_seed()?)))
        } else {
            open_attached_device()
        }
    });

    let ledger = WalrusClient::new(&settings.api_addr)?;
    tracing::debug!("using walrus server at {}", settings.api_addr);

    match command {
        Command::Version => {
            println!("walrus-cli v{}", env!("CARGO_PKG_VERSION"));
        }
        Command::Seed => {
            println!("{}", Seed::generate().to_hex());
        }
        Command::Balance { confirmed_only } => {
            flows::balance_flow(&ledger, &mut prompt, confirmed_only).await?;
        }
        Command::Addresses { history } => {
            flows::addresses_flow(&ledger, &mut prompt, history).await?;
        }
        Command::Addr { index } => {
            flows::addr_flow(&ledger, &mut signers, &mut prompt, index).await?;
        }
        Command::Txn {
            outputs,
            file,
            sign,
            broadcast,
            ..
        } => {
            let args = TxnArgs {
                outputs,
                file,
                sign,
                broadcast,
                change: settings.change_address.clone(),
            };
            flows::txn_flow(&ledger, &mut signers, &mut prompt, args).await?;
        }
        Command::Split {
            count,
            value,
            file,
            sign,
            broadcast,
            ..
        } => {
            let args = SplitArgs {
                count,
                value,
                file,
                sign,
                broadcast,
                change: settings.change_address.clone(),
            };
            flows::split_flow(&ledger, &mut signers, &mut prompt, args).await?;
        }
        Command::Sign { file, broadcast } => {
            flows::sign_flow(&ledger, &mut signers, &mut prompt, &file, broadcast).await?;
        }
        Command::Broadcast { file } => {
            flows::broadcast_flow(&ledger, &mut prompt, &file).await?;
        }
    }
    Ok(())
}
