// ABOUTME: Transaction module for ordered multi-step operations.
// ABOUTME: Failed transactions roll back completed steps in reverse order.

mod transaction;

pub use transaction::{Step, Transaction, TransactionOutcome, execute_transaction};

#[cfg(test)]
mod transaction_test;
