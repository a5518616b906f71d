//! Tradeledger Library
//!
//! This library provides the record-keeping core for dual-order automated
//! trading: the operation ledger, the market-vs-limit performance comparator,
//! and the daily metrics consolidator.

pub mod application;
pub mod domain;
pub mod persistence;
