//! Interactive session wrapping a single [`PerplexityClient`].
//!
//! The REPL owns exactly one client and hands it explicitly to every command
//! handler; there is no ambient instance. Session state (active model,
//! editing mode, query style, work area) persists to the config file as soon
//! as it changes.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use futures_util::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{EditMode, Editor};
use tracing::debug;

use plexi_client::{Error, PerplexityClient};

use crate::QUERY_DETAILED;
use crate::config::{MODE_EMACS, MODE_VI, ReplConfig};

const PROMPT: &str = "Ask anything (/exit to end): ";
const SEPARATOR: &str = "--------------------------------------------------";

/// A parsed REPL input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/active [n]` - show the active model or switch to model number n.
    Active(Option<String>),
    /// `/cinfo` - show config file path and contents.
    ConfigInfo,
    /// `/clear` - clear the screen.
    Clear,
    /// `/exit`, `/quit`, `/q`, `:q` - end the session.
    Exit,
    /// `/help`, `?` - command list.
    Help,
    /// `/mode [m]` - show or set the editing mode.
    Mode(Option<String>),
    /// `/models` - numbered model listing.
    Models,
    /// `/save` - save the last prompt and reply to the work area.
    Save,
    /// `/style [s]` - show or set the query style.
    Style(Option<String>),
    /// `/version` - version banner.
    Version,
    /// `/workarea [p]` - show or set the work area.
    WorkArea(Option<String>),
    /// Anything that does not start with a command sigil.
    Query(String),
    /// A sigil-prefixed token that matches no command.
    Unknown(String),
}

/// Split a line into a command and its first argument.
pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    if !trimmed.starts_with(['/', '?', ':']) {
        return Command::Query(trimmed.to_string());
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::to_string);

    match command {
        "/exit" | "/quit" | "/q" | ":q" => Command::Exit,
        "/active" => Command::Active(arg),
        "/cinfo" => Command::ConfigInfo,
        "/clear" => Command::Clear,
        "/help" | "?" => Command::Help,
        "/mode" => Command::Mode(arg),
        "/models" => Command::Models,
        "/save" => Command::Save,
        "/style" => Command::Style(arg),
        "/version" => Command::Version,
        "/workarea" => Command::WorkArea(arg),
        other => Command::Unknown(other.to_string()),
    }
}

/// Interactive session state.
pub struct Repl {
    client: PerplexityClient,
    config: ReplConfig,
    editor: Editor<(), FileHistory>,
    last_query: Option<String>,
    last_reply: Option<String>,
}

impl Repl {
    /// Build a session around an explicitly provided client.
    pub fn new(client: PerplexityClient) -> Result<Self> {
        let config = ReplConfig::load()?;
        let editor = build_editor(&config.editing_mode)?;
        Ok(Self {
            client,
            config,
            editor,
            last_query: None,
            last_reply: None,
        })
    }

    /// Run the session until `/exit`, EOF, or interrupt.
    pub async fn run(&mut self) -> Result<()> {
        self.apply_configured_model().await;
        self.hello();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);
                    match parse_line(&line) {
                        Command::Exit => break,
                        command => self.dispatch(command).await,
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(path) = ReplConfig::history_path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = self.editor.save_history(&path);
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Active(arg) => self.command_active(arg).await,
            Command::ConfigInfo => self.command_config_info(),
            Command::Clear => {
                clear_screen();
                println!("Editing mode = {}", self.config.editing_mode);
            }
            Command::Help => print_help(),
            Command::Mode(arg) => self.command_mode(arg),
            Command::Models => self.command_models(),
            Command::Save => self.command_save(),
            Command::Style(arg) => self.command_style(arg),
            Command::Version => print_version(),
            Command::WorkArea(arg) => self.command_work_area(arg),
            Command::Query(query) => self.command_query(&query).await,
            Command::Unknown(cmd) => {
                println!("Unknown command {cmd}; enter /help for the commands list");
            }
            // Exit is handled by the run loop before dispatch.
            Command::Exit => {}
        }
    }

    /// Bring the client onto the persisted model, falling back to the first
    /// catalog entry when the persisted name has disappeared.
    async fn apply_configured_model(&mut self) {
        if !self.client.models().contains(&self.config.active_model) {
            let Some(fallback) = self.client.models().first() else {
                return;
            };
            debug!(model = fallback, "configured model missing from catalog");
            self.config.active_model = fallback.to_string();
            self.persist_config();
        }
        if self.config.active_model == self.client.model() {
            return;
        }
        let target = self.config.active_model.clone();
        if let Err(e) = self.client.set_model(&target).await {
            println!("Could not activate configured model {target}: {e}");
        }
    }

    fn hello(&self) {
        clear_screen();
        println!("plexi - coding, scripting, and sysops assistant");
        self.show_active_model();
        println!("Enter /help for the commands list\n");
    }

    fn show_active_model(&self) {
        println!("Active model: {}\n", self.client.model());
    }

    async fn command_active(&mut self, arg: Option<String>) {
        if let Some(raw) = arg {
            let count = self.client.models().len();
            let index = match raw.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => n - 1,
                _ => {
                    println!("Invalid model number: {raw} (see /models for numbers 1-{count})");
                    return;
                }
            };
            let Some(name) = self.client.models().names().nth(index) else {
                return;
            };
            match self.client.set_model(name).await {
                Ok(()) => {
                    self.config.active_model = name.to_string();
                    self.persist_config();
                }
                Err(Error::ModelRejected { model, reason }) => {
                    println!("Model {model} is no longer servable by the provider: {reason}");
                }
                Err(e) => println!("Could not switch model: {e}"),
            }
        }
        self.show_active_model();
    }

    fn command_models(&self) {
        self.show_active_model();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Model").fg(Color::Cyan),
            Cell::new("Parameters").fg(Color::Cyan),
            Cell::new("Context").fg(Color::Cyan),
            Cell::new("Type").fg(Color::Cyan),
            Cell::new("Availability").fg(Color::Cyan),
        ]);

        for (n, (name, card)) in self.client.models().iter().enumerate() {
            table.add_row(vec![
                Cell::new(n + 1),
                Cell::new(name),
                Cell::new(card.parameters),
                Cell::new(format_context(card.context_length)),
                Cell::new(card.kind),
                Cell::new(card.availability),
            ]);
        }

        println!("{table}\n");
    }

    fn command_mode(&mut self, arg: Option<String>) {
        if let Some(mode) = arg {
            // Any value other than emacs collapses to vi.
            let mode = if mode.to_lowercase() == MODE_EMACS {
                MODE_EMACS
            } else {
                MODE_VI
            };
            match build_editor(mode) {
                Ok(editor) => {
                    self.editor = editor;
                    self.config.editing_mode = mode.to_string();
                    self.persist_config();
                }
                Err(e) => println!("Could not switch editing mode: {e}"),
            }
        }
        println!("Editing mode = {}", self.config.editing_mode);
    }

    fn command_style(&mut self, arg: Option<String>) {
        if let Some(style) = arg {
            self.config.query_code_style = style != "human";
            self.persist_config();
        }
        println!("Coding query style = {}", self.config.query_code_style);
    }

    fn command_work_area(&mut self, arg: Option<String>) {
        if let Some(path) = arg {
            self.config.work_area = Some(PathBuf::from(path));
            self.persist_config();
        }
        println!("Work area: {}", self.config.work_area_path().display());
    }

    fn command_config_info(&self) {
        match ReplConfig::config_path() {
            Some(path) => println!("Config file: {}", path.display()),
            None => println!("Config file: <unavailable>"),
        }
        match toml::to_string_pretty(&self.config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => println!("Could not render configuration: {e}"),
        }
    }

    fn command_save(&self) {
        let (Some(query), Some(reply)) = (&self.last_query, &self.last_reply) else {
            println!("Nothing to save");
            return;
        };
        let stamp = Local::now().format("%Y%m%d-%H:%M:%S");
        let path = self.config.work_area_path().join(format!("prompt-{stamp}.md"));
        let contents = format!("{query}\n{SEPARATOR}\n{reply}");
        match std::fs::write(&path, contents) {
            Ok(()) => println!("Last prompt and reply were saved to {}", path.display()),
            Err(e) => println!("Could not save: {e}"),
        }
    }

    async fn command_query(&mut self, query: &str) {
        let styled = if self.config.query_code_style {
            format!("{QUERY_DETAILED}{query}")
        } else {
            query.to_string()
        };
        self.last_query = Some(query.to_string());

        match self.stream_reply(&styled).await {
            Ok(reply) => {
                self.last_reply = Some(reply);
                println!("{SEPARATOR}\n");
            }
            Err(e) => println!("Query failed: {e}"),
        }
    }

    /// Stream the answer to stdout as fragments arrive; returns the full text.
    async fn stream_reply(&self, query: &str) -> Result<String> {
        let mut stream = self.client.query_stream(query).await?;
        let mut reply = String::new();
        let mut stdout = std::io::stdout();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            print!("{fragment}");
            let _ = stdout.flush();
            reply.push_str(&fragment);
        }
        println!();
        Ok(reply)
    }

    fn persist_config(&self) {
        if let Err(e) = self.config.save() {
            println!("Could not persist configuration: {e}");
        }
    }
}

fn build_editor(mode: &str) -> Result<Editor<(), FileHistory>> {
    let edit_mode = if mode == MODE_EMACS {
        EditMode::Emacs
    } else {
        EditMode::Vi
    };
    let rl_config = rustyline::Config::builder().edit_mode(edit_mode).build();
    let mut editor = Editor::with_config(rl_config)?;
    if let Some(path) = ReplConfig::history_path()
        && path.exists()
    {
        let _ = editor.load_history(&path);
    }
    Ok(editor)
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

fn format_context(tokens: u32) -> String {
    if tokens >= 1_000 {
        format!("{}K", tokens / 1_000)
    } else {
        tokens.to_string()
    }
}

fn print_help() {
    println!(
        "
/active [n] - display active model or set active to model n
/cinfo - display configuration info
/clear - clear the screen
/exit - end the session and return to the command prompt
/help - this commands list help
/mode [mode] - display or set the editing mode to vi or emacs
/models - list available models; n = model number
/quit - alias for /exit
/save - saves the last prompt and reply to the work area
/style [style] - display or set query style to code or human
/version - display the plexi version
/workarea [path] - sets or shows the current work area, defaults to $HOME
? - alias for /help
"
    );
}

fn print_version() {
    println!("plexi version {}\n", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exit_aliases() {
        assert_eq!(parse_line("/exit"), Command::Exit);
        assert_eq!(parse_line("/quit"), Command::Exit);
        assert_eq!(parse_line("/q"), Command::Exit);
        assert_eq!(parse_line(":q"), Command::Exit);
    }

    #[test]
    fn parse_active_with_and_without_argument() {
        assert_eq!(parse_line("/active"), Command::Active(None));
        assert_eq!(
            parse_line("/active 2"),
            Command::Active(Some("2".to_string()))
        );
        assert_eq!(
            parse_line("/active nonsense"),
            Command::Active(Some("nonsense".to_string()))
        );
    }

    #[test]
    fn parse_help_aliases() {
        assert_eq!(parse_line("/help"), Command::Help);
        assert_eq!(parse_line("?"), Command::Help);
    }

    #[test]
    fn parse_mode_style_workarea_arguments() {
        assert_eq!(
            parse_line("/mode emacs"),
            Command::Mode(Some("emacs".to_string()))
        );
        assert_eq!(
            parse_line("/style human"),
            Command::Style(Some("human".to_string()))
        );
        assert_eq!(
            parse_line("/workarea /tmp/wa"),
            Command::WorkArea(Some("/tmp/wa".to_string()))
        );
    }

    #[test]
    fn parse_bare_commands() {
        assert_eq!(parse_line("/cinfo"), Command::ConfigInfo);
        assert_eq!(parse_line("/clear"), Command::Clear);
        assert_eq!(parse_line("/models"), Command::Models);
        assert_eq!(parse_line("/save"), Command::Save);
        assert_eq!(parse_line("/version"), Command::Version);
    }

    #[test]
    fn parse_plain_text_is_a_query() {
        assert_eq!(
            parse_line("how do I reverse a list in Rust"),
            Command::Query("how do I reverse a list in Rust".to_string())
        );
    }

    #[test]
    fn parse_query_is_trimmed() {
        assert_eq!(
            parse_line("  spaced out  "),
            Command::Query("spaced out".to_string())
        );
    }

    #[test]
    fn parse_unknown_sigil_command() {
        assert_eq!(
            parse_line("/bogus"),
            Command::Unknown("/bogus".to_string())
        );
        assert_eq!(parse_line(":x"), Command::Unknown(":x".to_string()));
    }

    #[test]
    fn format_context_scales_to_thousands() {
        assert_eq!(format_context(131_072), "131K");
        assert_eq!(format_context(512), "512");
    }
}
