//! Console commands on top of clap.
//!
//! An [`Application`] owns a set of [`Command`]s and the process [`Factory`]
//! they share. Each run parses arguments with clap and hands the selected
//! command a [`CommandContext`] for reading input, writing output, prompting
//! and calling sibling commands.
//!
//! [`Factory`]: crate::process::Factory

pub mod application;
pub mod command;
pub mod input;
pub mod list;
pub mod output;

pub use application::Application;
pub use command::{definition, Command, CommandContext};
pub use input::Input;
pub use list::ListCommand;
pub use output::{BufferedOutput, Output, Style, Verbosity};
