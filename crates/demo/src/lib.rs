//! Side-by-side demo of the three playback sessions

pub mod command;
pub mod demo;
pub mod panel;

pub use command::{Command, ParseCommandError};
pub use demo::Demo;
pub use panel::{Control, Controls, Panel, Pressed};
