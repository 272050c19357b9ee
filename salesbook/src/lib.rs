//! Salesbook library
//!
//! Sales recording against a hierarchical catalog, and batch reports
//! (delimited table or paginated PDF) that can be regenerated later from
//! their backup snapshot.

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod report;
pub mod services;
pub mod storage;
