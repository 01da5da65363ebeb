//! CLI domain: parse, route, output, and presentation only.
//! No orchestration here; the route table dispatches to the engine.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_fetch_json, format_fetch_text, format_resource_json};
pub use route::RunContext;
