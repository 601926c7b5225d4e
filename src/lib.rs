//! Rule-based campaign automation for Meta ad accounts.
//!
//! Entry points for callers: [`tokens::build_tokens_for_user`],
//! [`runner::fetch_campaigns_for_runner`], [`runner::evaluate_condition`]
//! and [`facebook::GraphClient::pause_campaign`].

pub mod config;
pub mod constants;
pub mod crypto;
pub mod db;
pub mod facebook;
pub mod models;
pub mod runner;
pub mod tokens;
pub mod worker;

#[cfg(test)]
mod test_support;
