// TDB - Time-travel Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Line-oriented command console
//!
//! Reads one command per line and prints the outcome to stdout. Engine errors
//! are reported and the console keeps going.

use std::{fmt, str::FromStr};

use eyre::{bail, eyre, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

use tdb_common::{ExecutionPoint, Frame};
use tdb_engine::{
    Command, Debugger, EngineError, NavigationOutcome, ReplayTransport, SeekTarget,
};

const HELP: &str = "\
Commands:
  resume          run forward to the next pause
  rewind          run backward to the previous pause
  in              step in
  over            step over
  out             step out
  back-over       step backward over the previous statement
  seek <point>    pause at an execution point
  prev            go back in the pause history
  next            go forward in the pause history
  frames          show the call stack
  frame <index>   select a frame
  steps           show the steps of the selected frame
  status          show where the session is
  help            show this message
  quit            exit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Stepping or resume command
    Navigate(Command),
    /// Jump to a point
    Seek(ExecutionPoint),
    /// Previous history entry
    Back,
    /// Next history entry
    Forward,
    /// Show the call stack
    Frames,
    /// Select the frame at a stack index
    Frame(usize),
    /// Show the steps of the selected frame
    Steps,
    /// Show the session state
    Status,
    /// Show the command list
    Help,
    /// Leave the console
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = eyre::Report;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else { bail!("empty command") };
        let argument = words.next();
        if words.next().is_some() {
            bail!("too many arguments for '{name}'");
        }

        let command = match (name, argument) {
            ("resume", None) => Self::Navigate(Command::Resume),
            ("rewind", None) => Self::Navigate(Command::Rewind),
            ("in", None) => Self::Navigate(Command::StepIn),
            ("over", None) => Self::Navigate(Command::StepOver),
            ("out", None) => Self::Navigate(Command::StepOut),
            ("back-over", None) => Self::Navigate(Command::ReverseStepOver),
            ("seek", Some(point)) => Self::Seek(point.parse()?),
            ("prev", None) => Self::Back,
            ("next", None) => Self::Forward,
            ("frames", None) => Self::Frames,
            ("frame", Some(index)) => {
                Self::Frame(index.parse().map_err(|_| eyre!("invalid frame index '{index}'"))?)
            }
            ("steps", None) => Self::Steps,
            ("status", None) => Self::Status,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            ("seek" | "frame", None) => bail!("'{name}' needs an argument"),
            (_, Some(_)) if is_known(name) => bail!("'{name}' takes no argument"),
            _ => bail!("unknown command '{name}', try 'help'"),
        };
        Ok(command)
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "resume"
            | "rewind"
            | "in"
            | "over"
            | "out"
            | "back-over"
            | "prev"
            | "next"
            | "frames"
            | "steps"
            | "status"
            | "help"
            | "quit"
            | "exit"
    )
}

/// Human readable navigation outcome
struct Outcome<'a>(&'a NavigationOutcome);

impl fmt::Display for Outcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            NavigationOutcome::Paused(entry) => {
                write!(f, "paused at {} ({})", entry.execution_point, entry.pause_id)
            }
            NavigationOutcome::Running => write!(f, "reached the edge of the recording"),
            NavigationOutcome::Unavailable(point) => write!(f, "no pause available at {point}"),
            NavigationOutcome::Superseded => write!(f, "superseded by a newer command"),
        }
    }
}

fn describe_frame(frame: &Frame) -> String {
    format!(
        "#{} {} at {}",
        frame.index,
        frame.function_name.as_deref().unwrap_or("<anonymous>"),
        frame.display_location(true)
    )
}

/// Console over a [`Debugger`]
pub struct Console<T> {
    debugger: Debugger<T>,
}

impl<T: ReplayTransport> Console<T> {
    /// Create a console driving `debugger`
    pub fn new(debugger: Debugger<T>) -> Self {
        Self { debugger }
    }

    /// The engine behind the console
    pub fn debugger(&self) -> &Debugger<T> {
        &self.debugger
    }

    /// Read commands from `input` until it ends or `quit` is entered
    pub async fn run<R: AsyncRead + Unpin>(&self, input: R) -> Result<()> {
        let mut lines = BufReader::new(input).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => {
                    debug!(?command, "Executing console command");
                    if let Err(err) = self.execute(command).await {
                        println!("error: {err}");
                    }
                }
                Err(err) => println!("{err}"),
            }
        }

        info!("Console closed");
        Ok(())
    }

    /// Execute one command and print its result
    pub async fn execute(&self, command: ConsoleCommand) -> Result<(), EngineError> {
        match command {
            ConsoleCommand::Navigate(command) => {
                let outcome = self.debugger.run_command(command).await?;
                println!("{}", Outcome(&outcome));
            }
            ConsoleCommand::Seek(point) => {
                let outcome = self.debugger.seek(SeekTarget::point(point)).await?;
                println!("{}", Outcome(&outcome));
            }
            ConsoleCommand::Back => match self.debugger.go_back().await? {
                Some(outcome) => println!("{}", Outcome(&outcome)),
                None => println!("already at the oldest pause"),
            },
            ConsoleCommand::Forward => match self.debugger.go_forward().await? {
                Some(outcome) => println!("{}", Outcome(&outcome)),
                None => println!("already at the newest pause"),
            },
            ConsoleCommand::Frames => self.print_frames().await?,
            ConsoleCommand::Frame(index) => {
                let frames = self.debugger.frames().await?;
                match frames.iter().find(|frame| frame.index == index) {
                    Some(frame) => {
                        let frame = self.debugger.select_frame(&frame.id).await?;
                        println!("selected {}", describe_frame(&frame));
                    }
                    None => println!("no frame at index {index}"),
                }
            }
            ConsoleCommand::Steps => self.print_steps().await?,
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }

    async fn print_frames(&self) -> Result<(), EngineError> {
        let frames = self.debugger.frames().await?;
        if frames.is_empty() {
            println!("no call stack");
            return Ok(());
        }

        let selected = self.debugger.snapshot().selected_frame_id().cloned();
        for frame in frames.iter() {
            let marker = if Some(&frame.id) == selected.as_ref() { ">" } else { " " };
            println!("{marker} {}", describe_frame(frame));
        }
        Ok(())
    }

    async fn print_steps(&self) -> Result<(), EngineError> {
        let Some(steps) = self.debugger.load_selected_frame_steps().await? else {
            println!("no frame selected");
            return Ok(());
        };
        if steps.is_empty() {
            println!("steps of this frame are not available");
            return Ok(());
        }

        let current = self.debugger.snapshot().current_execution_point().cloned();
        for step in steps.iter() {
            let marker = if Some(&step.point) == current.as_ref() { ">" } else { " " };
            println!("{marker} {} {}", step.point, step.location);
        }
        Ok(())
    }

    fn print_status(&self) {
        let state = self.debugger.snapshot();
        let history = self.debugger.history();

        println!("status: {}", state.status());
        if let Some(point) = state.current_execution_point() {
            println!("point:  {point}");
        }
        if let Some(time) = state.current_time() {
            println!("time:   {time:.1}ms");
        }
        if let Some(pause_id) = state.current_pause_id() {
            println!("pause:  {pause_id}");
        }
        if let Some(frame_id) = state.selected_frame_id() {
            println!("frame:  {frame_id}");
        }
        if let Some(cursor) = history.cursor() {
            println!("history: {}/{}", cursor + 1, history.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation() {
        assert_eq!("resume".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Navigate(Command::Resume));
        assert_eq!(
            "back-over".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Navigate(Command::ReverseStepOver)
        );
        assert_eq!("  over  ".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Navigate(Command::StepOver));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            "seek 00420".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Seek(ExecutionPoint::new("420"))
        );
        assert_eq!("frame 2".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Frame(2));
        assert_eq!("exit".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("seek".parse::<ConsoleCommand>().is_err());
        assert!("seek abc".parse::<ConsoleCommand>().is_err());
        assert!("frame -1".parse::<ConsoleCommand>().is_err());
        assert!("over 3".parse::<ConsoleCommand>().is_err());
        assert!("jump".parse::<ConsoleCommand>().is_err());
        assert!("seek 1 2".parse::<ConsoleCommand>().is_err());
    }
}
