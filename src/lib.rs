#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_wraps
)]

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod gateway;
pub mod memory;
pub mod security;
pub mod sessions;
pub mod util;

pub use config::Config;

/// Auth management subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthCommands {
    /// Set a dashboard password and switch auth mode to password
    #[command(long_about = "\
Set a dashboard password and switch auth mode to password.

Prompts for the password twice (hidden input), stores a scrypt hash \
in the config file, and sets gateway.auth.mode = \"password\". Bearer \
tokens stop working once password mode is active; browser logins mint \
a session cookie instead.

Examples:
  opengrasp auth set-password")]
    SetPassword,
    /// Print the current gateway token
    ShowToken,
    /// Generate a fresh gateway token and save it
    #[command(long_about = "\
Generate a fresh gateway token and save it.

Replaces gateway.auth.token with a new random 48-hex-char value and \
writes the config file. Existing dashboard session cookies stay valid; \
clients using the old bearer token must switch to the new one.

Examples:
  opengrasp auth rotate-token")]
    RotateToken,
}
