pub mod error;
pub mod ledger;
pub mod report;
