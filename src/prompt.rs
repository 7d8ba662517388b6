//! Terminal interaction: status lines, ENTER-to-continue confirmations and
//! reading the seed.

use std::io::{self, BufRead, Write};

use zeroize::Zeroize;

use crate::error::{WalletError, WalletResult};
use crate::signer::seed::Seed;

pub const SEED_ENV_VAR: &str = "WALRUS_SEED";

pub trait Prompt {
    /// Shows one line of user-facing output.
    fn show(&mut self, line: &str);

    /// Blocks until the user accepts `message`; declining yields
    /// [`WalletError::UserCancelled`].
    fn confirm(&mut self, message: &str) -> WalletResult<()>;
}

/// Reads confirmations from stdin. ENTER accepts; `n`, `no` or end of input
/// cancels.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn show(&mut self, line: &str) {
        println!("{}", line);
    }

    fn confirm(&mut self, message: &str) -> WalletResult<()> {
        print!("{} ", message);
        io::stdout().flush()?;
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(WalletError::UserCancelled);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "n" | "no" => Err(WalletError::UserCancelled),
            _ => Ok(()),
        }
    }
}

/// Reads the seed from `WALRUS_SEED`, or asks for it without echo. The seed
/// must be the 64 hex characters printed by the `seed` command.
pub fn read_seed() -> WalletResult<Seed> {
    let mut phrase = match std::env::var(SEED_ENV_VAR) {
        Ok(phrase) => {
            tracing::debug!("using seed from {}", SEED_ENV_VAR);
            phrase
        }
        Err(_) => rpassword::prompt_password("Seed: ").map_err(|err| {
            WalletError::SignerUnavailable(format!("could not read seed: {}", err))
        })?,
    };
    let seed = if phrase.trim().is_empty() {
        Err(WalletError::SignerUnavailable("no seed supplied".to_string()))
    } else {
        Seed::from_hex(&phrase)
    };
    phrase.zeroize();
    seed
}
