use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "powchain-node")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(
        name = "newaccount",
        about = "Generate a key pair and store it as a new account"
    )]
    NewAccount,
    #[command(name = "coinbase", about = "Print the account that receives mining rewards")]
    Coinbase,
    #[command(name = "listaccounts", about = "Print local account addresses")]
    ListAccounts,
    #[command(name = "setcoinbase", about = "Send mining rewards to a stored account")]
    SetCoinbase {
        #[arg(help = "The account address")]
        address: String,
    },
    #[command(name = "verifyaddress", about = "Check an address checksum")]
    VerifyAddress {
        #[arg(help = "The address to check")]
        address: String,
    },
    #[command(name = "mine", about = "Produce and store the next block locally")]
    Mine,
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "startnode", about = "Start a chain node")]
    StartNode {
        #[arg(long = "mine", help = "Keep mining blocks for the coinbase account")]
        mine: bool,
    },
}
