//! Interactive terminal transport.

use runtime::{Backend, ChatService, SessionBridge};
use std::future::Future;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

pub const PROMPT: &str = "Your query: ";

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// A read-eval-print loop over a line source and two sinks.
///
/// Replies stream to `output` as they arrive; turn errors go to `errors`.
pub struct Terminal<R, W, E> {
    input: Lines<R>,
    output: W,
    errors: E,
}

impl Terminal<BufReader<Stdin>, io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), io::stdout(), io::stderr())
    }
}

impl<R, W, E> Terminal<R, W, E>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
    E: Write,
{
    pub fn new(input: R, output: W, errors: E) -> Self {
        Self {
            input: input.lines(),
            output,
            errors,
        }
    }

    /// Run until `quit`, end of input, or `interrupt` resolves.
    ///
    /// An interrupt during a turn cancels it.
    pub async fn run<B, S>(
        &mut self,
        chat: &mut ChatService<B, S>,
        interrupt: impl Future<Output = ()>,
    ) -> io::Result<()>
    where
        B: Backend,
        S: SessionBridge,
    {
        tokio::pin!(interrupt);

        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            let input = tokio::select! {
                line = self.input.next_line() => match line? {
                    Some(line) => Input::Line(line),
                    None => Input::Eof,
                },
                () = &mut interrupt => Input::Interrupted,
            };
            let line = match input {
                Input::Line(line) => line,
                Input::Eof => {
                    writeln!(self.output)?;
                    return Ok(());
                }
                Input::Interrupted => return self.interrupted(),
            };

            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("quit") {
                writeln!(self.output, "Goodbye!")?;
                return Ok(());
            }

            let output = &mut self.output;
            let mut write_error = None;
            let reply = tokio::select! {
                reply = chat.turn(query, |fragment| {
                    if write_error.is_none() {
                        if let Err(e) = write_fragment(output, fragment) {
                            write_error = Some(e);
                        }
                    }
                }) => Some(reply),
                () = &mut interrupt => None,
            };
            let Some(reply) = reply else {
                return self.interrupted();
            };
            if let Some(e) = write_error {
                return Err(e);
            }

            writeln!(self.output)?;
            if let Some(e) = reply.error {
                writeln!(self.errors, "Error: {e}")?;
            }
        }
    }

    fn interrupted(&mut self) -> io::Result<()> {
        writeln!(self.output, "\nInterrupted. Goodbye!")?;
        self.output.flush()
    }
}

fn write_fragment(output: &mut impl Write, fragment: &str) -> io::Result<()> {
    output.write_all(fragment.as_bytes())?;
    output.flush()
}
