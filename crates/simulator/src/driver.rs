//! Menu-driven console driver.

use raymond_core::Action;
use raymond_mutex::{MutexCoordinator, MutexError};
use raymond_types::NodeId;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use tracing::debug;

const MENU: &str = "1. Create request for node n\n\
                    2. Release token from current holder\n\
                    3. Display data\n\
                    4. Exit\n\
                    Enter your choice: ";

/// Interactive request / release / display loop over a line-oriented stream.
///
/// Input is read as whitespace-separated tokens, so `1 3` on one line is the
/// same as `1` and `3` on two lines. End of input exits the loop.
pub struct InteractiveDriver<R, W> {
    tree: MutexCoordinator,
    input: R,
    output: W,
    tokens: VecDeque<String>,
}

impl<R: BufRead, W: Write> InteractiveDriver<R, W> {
    pub fn new(tree: MutexCoordinator, input: R, output: W) -> Self {
        Self {
            tree,
            input,
            output,
            tokens: VecDeque::new(),
        }
    }

    pub fn tree(&self) -> &MutexCoordinator {
        &self.tree
    }

    /// Run until the user exits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            write!(self.output, "{}", MENU)?;
            self.output.flush()?;

            let Some(choice) = self.next_token()? else {
                writeln!(self.output)?;
                return Ok(());
            };
            debug!(%choice, "Menu choice");

            match choice.as_str() {
                "1" => self.request()?,
                "2" => self.release()?,
                "3" => write!(self.output, "{}", self.tree.snapshot())?,
                "4" => {
                    writeln!(self.output, "Exiting")?;
                    return Ok(());
                }
                _ => writeln!(self.output, "Invalid choice")?,
            }
        }
    }

    fn request(&mut self) -> io::Result<()> {
        let (low, high) = self.id_range();
        write!(
            self.output,
            "Enter node to make request with ({}-{}): ",
            low, high
        )?;
        self.output.flush()?;

        let Some(token) = self.next_token()? else {
            return Ok(());
        };
        let Ok(raw) = token.parse::<u32>() else {
            writeln!(self.output, "Invalid node")?;
            return Ok(());
        };

        match self.tree.request(NodeId(raw)) {
            Ok(actions) => self.print_actions(&actions),
            Err(MutexError::AlreadyHolder(_)) => writeln!(self.output, "Node already has token"),
            Err(_) => writeln!(self.output, "Invalid node"),
        }
    }

    fn release(&mut self) -> io::Result<()> {
        let (_, actions) = self.tree.release();
        self.print_actions(&actions)
    }

    fn print_actions(&mut self, actions: &[Action]) -> io::Result<()> {
        for action in actions {
            writeln!(self.output, "{}", action)?;
        }
        Ok(())
    }

    /// Smallest and largest node id, for the prompt.
    fn id_range(&self) -> (u32, u32) {
        let ids = self.tree.topology().node_ids().iter().map(|id| id.as_u32());
        let low = ids.clone().min().unwrap_or_default();
        let high = ids.max().unwrap_or_default();
        (low, high)
    }

    fn next_token(&mut self) -> io::Result<Option<String>> {
        while self.tokens.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.tokens
                .extend(line.split_whitespace().map(str::to_owned));
        }
        Ok(self.tokens.pop_front())
    }
}
