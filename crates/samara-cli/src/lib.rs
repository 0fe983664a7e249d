// NOTE: Command organization rationale
//
// Why namespaced subcommands (not flat)?
// - One namespace per component keeps the surface navigable: stream,
//   digest, audit, threads, wake, triggers, senses
// - `stream query` and `stream mark-distilled` read better than a
//   flat pile of hyphenated verbs
// - `--format {text,json}` is global: every verb has a structured
//   rendering for scripts and a terse one for humans

mod args;
mod commands;
mod handlers;

pub use args::{
    Cli, Commands, OutputFormat, SensesCommand, StreamCommand, ThreadsCommand, TriggersCommand,
    WakeCommand,
};
pub use commands::run;
