//! Economy game: catalogs, command parsing, the pure command processor and
//! the service that persists its transitions

pub mod catalog;
pub mod command;
pub mod dice;
pub mod format;
pub mod locks;
pub mod outcome;
pub mod processor;
pub mod record;
pub mod service;

pub use command::{Amount, Command, EconomyCommand, Invocation};
pub use dice::{Dice, ScriptedDice};
pub use outcome::{Button, CommandError, Outcome};
pub use record::{EconomyPatch, EconomyRecord};
pub use service::{CommandResult, EconomyService};
