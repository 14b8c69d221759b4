//! Behaviors module: closed-loop routines built on the drive
pub mod auto_balance;

pub use auto_balance::AutoBalance;
