pub mod broadcast;
pub mod change;
pub mod config;
pub mod currency;
pub mod donation;
pub mod encoding;
pub mod error;
pub mod flows;
pub mod ledger;
pub mod prompt;
pub mod selection;
pub mod signer;
pub mod signing;
pub mod split;
pub mod txn_file;
pub mod types;

#[cfg(test)]
mod test_utils;
