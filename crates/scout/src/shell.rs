//! The interactive prompt loop.

use std::future::pending;
use std::io::{self, Write};
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use scout_core::AskError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::sleep;

use crate::session::{Session, SessionBuilder};

const BAR_CHAR: &str = "▎";
const FAREWELL: &str = "Have a nice day! 👋";

/// A line typed at the prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// End the session.
    Quit,
    /// Nothing to do.
    Skip,
    /// Ask a question.
    Ask(&'a str),
}

impl<'a> Command<'a> {
    /// Reads a command from a line of input.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Skip;
        }
        let is_quit = ["quit", "exit", "bye"]
            .iter()
            .any(|word| line.eq_ignore_ascii_case(word));
        if is_quit {
            Command::Quit
        } else {
            Command::Ask(line)
        }
    }
}

/// Where interrupt requests come from.
enum Interrupts {
    CtrlC,
    Channel(UnboundedReceiver<()>),
}

impl Interrupts {
    /// Resolves on the next interrupt. Never resolves if interrupts can no
    /// longer arrive.
    async fn recv(&mut self) {
        match self {
            Interrupts::CtrlC => {
                if let Err(err) = signal::ctrl_c().await {
                    warn!("cannot listen for ctrl-c: {err}");
                    pending::<()>().await;
                }
            }
            Interrupts::Channel(rx) => {
                if rx.recv().await.is_none() {
                    pending::<()>().await;
                }
            }
        }
    }
}

enum SessionEvent {
    Transcript(String),
    ToolCall { tool_name: String, query: String },
    ToolFailed(String),
}

/// The interactive shell: reads questions, shows progress, prints answers.
pub struct Shell<R, W> {
    input: R,
    output: W,
    verbose: bool,
    spinner: bool,
    mid_line: bool,
    interrupts: Option<UnboundedReceiver<()>>,
}

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    /// Creates a shell reading lines from `input` and printing to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            verbose: false,
            spinner: true,
            mid_line: false,
            interrupts: None,
        }
    }

    /// Echoes the model's reasoning as it streams.
    #[inline]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Shows a spinner while the agent works.
    #[inline]
    pub fn with_spinner(mut self, spinner: bool) -> Self {
        self.spinner = spinner;
        self
    }

    /// Takes interrupts from `interrupts` instead of Ctrl-C.
    ///
    /// An interrupt cancels the running question, or ends the session when
    /// sent at the prompt.
    #[inline]
    pub fn with_interrupts(
        mut self,
        interrupts: UnboundedReceiver<()>,
    ) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Runs the session until the user quits, the input ends or an
    /// interrupt arrives at the prompt.
    pub async fn run(mut self, builder: SessionBuilder) -> io::Result<()> {
        let mut interrupts = match self.interrupts.take() {
            Some(rx) => Interrupts::Channel(rx),
            None => Interrupts::CtrlC,
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut session = builder
            .on_transcript({
                let event_tx = event_tx.clone();
                move |delta| {
                    let event = SessionEvent::Transcript(delta.to_owned());
                    event_tx.send(event).ok();
                }
            })
            .on_tool_call({
                let event_tx = event_tx.clone();
                move |req| {
                    let query = match req.arguments.get_str("query") {
                        Some(query) => query.to_owned(),
                        None => req.arguments.to_string(),
                    };
                    event_tx
                        .send(SessionEvent::ToolCall {
                            tool_name: req.tool_name.clone(),
                            query,
                        })
                        .ok();
                }
            })
            .on_observation(move |observation| {
                if !observation.succeeded {
                    let event = SessionEvent::ToolFailed(
                        observation.result.clone(),
                    );
                    event_tx.send(event).ok();
                }
            })
            .build();

        let out = &mut self.output;
        writeln!(
            out,
            "{}",
            "Welcome to Scout, a research assistant with web search"
                .bold()
                .green()
        )?;
        writeln!(out, "{}", "Type 'quit' to exit".bold().green())?;

        loop {
            write!(self.output, "\n{}\n", "User:".bold())?;
            self.output.flush()?;

            let line = select! {
                line = self.read_line() => line,
                _ = interrupts.recv() => {
                    info!("interrupted at the prompt");
                    None
                }
            };
            let Some(line) = line else {
                break;
            };
            match Command::parse(&line) {
                Command::Quit => break,
                Command::Skip => continue,
                Command::Ask(question) => {
                    self.answer(
                        &mut session,
                        &mut event_rx,
                        &mut interrupts,
                        question,
                    )
                    .await?;
                }
            }
        }

        writeln!(self.output, "\n{}\n{FAREWELL}", "Agent:".bold().cyan())?;
        Ok(())
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                error!("error reading input: {}", err);
                None
            }
        }
    }

    async fn answer(
        &mut self,
        session: &mut Session,
        event_rx: &mut UnboundedReceiver<SessionEvent>,
        interrupts: &mut Interrupts,
        question: &str,
    ) -> io::Result<()> {
        let progress_style =
            ProgressStyle::with_template("{spinner} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        let mut progress_bar: Option<ProgressBar> = None;

        let mut ask = pin!(session.ask(question));
        let mut cancel = pin!(interrupts.recv());

        let outcome = loop {
            // Create a new progress bar if it has been finished.
            if self.spinner && !self.mid_line {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("🤔 Thinking...");
                        progress_bar
                    })
                    .inc(1);
            }

            let event = select! {
                outcome = &mut ask => break Some(outcome),
                _ = &mut cancel => break None,
                Some(event) = event_rx.recv() => event,
                _ = sleep(Duration::from_millis(100)) => continue,
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }
            self.render(event)?;
        };
        if let Some(progress_bar) = progress_bar.take() {
            progress_bar.finish_and_clear();
        }

        // Events sent while the question finished are still queued.
        while let Ok(event) = event_rx.try_recv() {
            if outcome.is_some() {
                self.render(event)?;
            }
        }
        self.end_line()?;

        let Some(outcome) = outcome else {
            info!("question cancelled");
            writeln!(self.output, "{}", "Cancelled.".yellow())?;
            return Ok(());
        };
        match outcome {
            Ok(answer) => {
                writeln!(self.output, "\n{}", "Agent:".bold().green())?;
                writeln!(self.output, "{answer}")?;
            }
            Err(AskError::StepBudgetExceeded { max_steps }) => {
                writeln!(
                    self.output,
                    "{}",
                    format!(
                        "Agent could not complete an answer within \
                         {max_steps} steps."
                    )
                    .yellow()
                )?;
            }
            Err(AskError::Parse(err)) => {
                warn!("showing unparsed reply: {}", err.reason);
                writeln!(
                    self.output,
                    "\n{} {}",
                    "Agent:".bold().green(),
                    "(the reply did not follow the expected format)".yellow()
                )?;
                writeln!(self.output, "{}", err.raw)?;
            }
            Err(err @ AskError::Model(_)) => {
                error!("{err:?}");
                writeln!(
                    self.output,
                    "{} {err}",
                    "Unexpected Error:".bold().red()
                )?;
            }
            Err(AskError::EmptyQuestion) => {}
        }
        Ok(())
    }

    fn render(&mut self, event: SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Transcript(delta) => {
                if !self.verbose {
                    return Ok(());
                }
                write!(self.output, "{}", delta.dimmed())?;
                self.output.flush()?;
                self.mid_line = !delta.ends_with('\n');
            }
            SessionEvent::ToolCall { tool_name, query } => {
                self.end_line()?;
                writeln!(
                    self.output,
                    "{}🔍 {} {}",
                    BAR_CHAR.bright_yellow(),
                    tool_name.bold(),
                    query.bright_white()
                )?;
            }
            SessionEvent::ToolFailed(result) => {
                self.end_line()?;
                writeln!(
                    self.output,
                    "{}{}",
                    BAR_CHAR.bright_red(),
                    result.bold().red()
                )?;
            }
        }
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.output)?;
            self.mid_line = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use scout_core::tool::{Error as ToolError, Tool, ToolResult};
    use scout_test_model::{PresetResponse, TestModelProvider};
    use serde_json::{Value, json};
    use tokio::io::{AsyncWriteExt, BufReader, duplex};

    use super::*;

    static NULL_SCHEMA: Value = Value::Null;

    struct FakeSearch {
        fail: bool,
    }

    impl Tool for FakeSearch {
        type Input = Value;

        fn name(&self) -> &str {
            "search"
        }

        fn description(&self) -> &str {
            "Searches the web."
        }

        fn parameter_schema(&self) -> &Value {
            &NULL_SCHEMA
        }

        fn input_from_text(&self, text: &str) -> Result<Value, ToolError> {
            Ok(json!({ "query": text }))
        }

        fn execute(
            &self,
            input: Value,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(if self.fail {
                Err(ToolError::execution_error().with_reason("quota exceeded"))
            } else {
                Ok(format!("{}: sunny, 24°C", input["query"]))
            })
        }
    }

    fn react_action(query: &str) -> PresetResponse {
        PresetResponse::text(format!(
            "Thought: I should search.\nAction: search\n\
             Action Input: {query}"
        ))
    }

    fn react_answer(answer: &str) -> PresetResponse {
        PresetResponse::text(format!(
            "Thought: I now know the final answer\nFinal Answer: {answer}"
        ))
    }

    async fn run_shell(
        input: &str,
        builder: SessionBuilder,
        verbose: bool,
    ) -> String {
        let mut output = Vec::new();
        Shell::new(input.as_bytes(), &mut output)
            .with_spinner(false)
            .with_verbose(verbose)
            .run(builder)
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    fn builder(provider: &TestModelProvider) -> SessionBuilder {
        SessionBuilder::with_model_provider(provider.clone())
            .with_tool(FakeSearch { fail: false })
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::parse("quit\n"), Command::Quit);
        assert_eq!(Command::parse("  Exit "), Command::Quit);
        assert_eq!(Command::parse("BYE"), Command::Quit);
        assert_eq!(Command::parse("   \n"), Command::Skip);
        assert_eq!(
            Command::parse(" What is the weather in Paris today?\n"),
            Command::Ask("What is the weather in Paris today?")
        );
        assert_eq!(
            Command::parse("quit smoking tips"),
            Command::Ask("quit smoking tips")
        );
    }

    #[tokio::test]
    async fn test_quit_makes_no_model_call() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_answer("unused"));

        let output = run_shell("  QUIT \n", builder(&provider), false).await;
        assert!(output.contains("Type 'quit' to exit"));
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let provider = TestModelProvider::default();
        let output = run_shell("", builder(&provider), false).await;
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_weather_in_paris() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_action("weather Paris today"));
        provider.add_response(react_answer("It is sunny in Paris."));

        let output = run_shell(
            "What is the weather in Paris today?\n\nbye\n",
            builder(&provider),
            false,
        )
        .await;
        assert!(output.contains("weather Paris today"));
        assert!(output.contains("It is sunny in Paris."));
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_tool_failure_shown() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_action("weather Paris today"));
        provider.add_response(react_answer("I could not search."));
        let builder = SessionBuilder::with_model_provider(provider.clone())
            .with_tool(FakeSearch { fail: true });

        let output = run_shell("Weather?\nquit\n", builder, false).await;
        assert!(output.contains("Tool execution failed: quota exceeded"));
        assert!(output.contains("I could not search."));
    }

    #[tokio::test]
    async fn test_step_budget_message() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_action("again"));
        let builder = builder(&provider).with_max_steps(1);

        let output = run_shell("Loop\nquit\n", builder, false).await;
        assert!(output.contains("could not complete an answer within 1"));
        assert!(output.contains("Have a nice day!"));
    }

    #[tokio::test]
    async fn test_degraded_answer() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("Probably sunny."));
        provider.add_response(PresetResponse::text("Surely sunny."));

        let output = run_shell("Weather?\nquit\n", builder(&provider), false)
            .await;
        assert!(output.contains("did not follow the expected format"));
        assert!(output.contains("Surely sunny."));
    }

    #[tokio::test]
    async fn test_model_error_continues() {
        let provider = TestModelProvider::default();

        let output =
            run_shell("Hi\nStill there?\nquit\n", builder(&provider), false)
                .await;
        assert_eq!(output.matches("Unexpected Error:").count(), 2);
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_verbose_transcript() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_action("rust language"));
        provider.add_response(react_answer("Rust is a language."));

        let output =
            run_shell("What is Rust?\nquit\n", builder(&provider), true)
                .await;
        assert!(output.contains("Thought: I should search."));
        assert!(output.contains("rust language"));
        assert!(output.contains("Rust is a language."));
    }

    fn interrupt_after(delay: Duration) -> UnboundedReceiver<()> {
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            sleep(delay).await;
            interrupt_tx.send(()).ok();
        });
        interrupt_rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_at_prompt_after_question() {
        let mut provider = TestModelProvider::default();
        provider.add_response(react_answer("Hello there."));

        // Keep the writer open so the second prompt waits for input.
        let (mut writer, reader) = duplex(64);
        writer.write_all(b"Hello\n").await.unwrap();

        let mut output = Vec::new();
        Shell::new(BufReader::new(reader), &mut output)
            .with_spinner(false)
            .with_interrupts(interrupt_after(Duration::from_secs(1)))
            .run(builder(&provider))
            .await
            .unwrap();
        drop(writer);

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Hello there."));
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_question() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_secs(60));
        provider.add_response(react_answer("Too late."));

        let mut output = Vec::new();
        Shell::new("Slow question\nquit\n".as_bytes(), &mut output)
            .with_spinner(false)
            .with_interrupts(interrupt_after(Duration::from_secs(1)))
            .run(builder(&provider))
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Cancelled."));
        assert!(!output.contains("Too late."));
        assert!(output.contains("Have a nice day!"));
        assert_eq!(provider.request_count(), 1);
    }
}
