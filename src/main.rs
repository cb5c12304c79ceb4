use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use memekit::controller::CatalogStatus;
use memekit::{ClientConfig, Command, Locale, Phase, Session, Shown};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memekit", version, about = "Browse meme templates and render memes")]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    catalog_url: Option<String>,

    #[arg(long)]
    render_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Extra attempts after a failed request
    #[arg(long)]
    retries: Option<u32>,

    /// Label language (zh, en)
    #[arg(long)]
    locale: Option<Locale>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// List templates, optionally filtered by name or type
    List { search: Option<String> },
    /// Show a template and its form
    Show { id: String },
    /// Print the render URL without fetching it
    Url {
        id: String,
        /// Form value as key=value
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Render a meme
    Generate {
        id: String,
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Save the image here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Interactive session with history
    Repl,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", s))
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.catalog_url {
            config.catalog_endpoint = url.clone();
        }
        if let Some(url) = &self.render_url {
            config.render_endpoint = url.clone();
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(locale) = self.locale {
            config.locale = locale;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config()?;
    let mut session = Session::new(config).context("failed to start session")?;

    match cli.action {
        Action::List { search } => {
            load_catalog(&mut session)?;
            session.dispatch(Command::Search(search.unwrap_or_default()))?;
            print_list(&session);
        }
        Action::Show { id } => {
            load_catalog(&mut session)?;
            session.dispatch(Command::Select(id))?;
            print_selected(&session);
        }
        Action::Url { id, params } => {
            prepare(&mut session, id, params)?;
            println!("{}", session.controller().render_url()?);
        }
        Action::Generate { id, params, output } => {
            prepare(&mut session, id, params)?;
            session.dispatch(Command::Generate)?;
            session.wait_idle();
            report_render(&mut session)?;
            if let Some(path) = output {
                session.download(&path)?;
                println!("saved {}", path.display());
            }
        }
        Action::Repl => repl(&mut session)?,
    }
    Ok(())
}

fn load_catalog(session: &mut Session) -> anyhow::Result<()> {
    session.dispatch(Command::OpenCatalog)?;
    session.wait_idle();
    session.dispatch(Command::CloseCatalog)?;
    if let Some(err) = session.controller_mut().take_error() {
        if let Some(notice) = session.controller().notice() {
            eprintln!("{}", notice);
        }
        return Err(err).context("catalog load failed");
    }
    Ok(())
}

fn prepare(session: &mut Session, id: String, params: Vec<(String, String)>) -> anyhow::Result<()> {
    load_catalog(session)?;
    session.dispatch(Command::Select(id))?;
    for (key, value) in params {
        session.dispatch(Command::SetField { key, value })?;
    }
    Ok(())
}

fn report_render(session: &mut Session) -> anyhow::Result<()> {
    if let Some(shown) = session.controller().shown() {
        match shown {
            Shown::Rendered(image) => {
                println!("{} ({}x{} {})", image.url, image.width, image.height, image.extension())
            }
            Shown::Recalled(entry) => println!("{}", entry.url),
        }
        return Ok(());
    }
    if let Some(notice) = session.controller().notice() {
        eprintln!("{}", notice);
    }
    match session.controller_mut().take_error() {
        Some(err) => Err(err.into()),
        None => bail!("render did not finish"),
    }
}

fn print_list(session: &Session) {
    let controller = session.controller();
    if controller.catalog_status() == CatalogStatus::Failed {
        if let Some(notice) = controller.notice() {
            println!("{}", notice);
        }
        return;
    }
    let visible = controller.visible();
    if visible.is_empty() {
        println!("{}", controller.no_results_notice());
        return;
    }
    for template in visible {
        println!("{:>6}  {}  #{}", template.id, template.name, template.kind);
    }
}

fn print_selected(session: &Session) {
    let controller = session.controller();
    let Some(template) = controller.selected() else {
        return;
    };
    println!("{}  #{}", template.name, template.kind);
    if let Some(preview) = &template.preview_url {
        println!("preview: {}", preview);
    }
    if !template.tisp.is_empty() {
        println!("{}", template.tisp);
    }
    if controller.form().is_empty() {
        if let Some(notice) = controller.notice() {
            println!("{}", notice);
        }
        return;
    }
    for field in &controller.form().fields {
        let value = controller.values().get(&field.key).unwrap_or_default();
        println!("  {:<10} {:<10} = {:?}  ({})", field.key, field.label, value, field.placeholder);
    }
}

const REPL_HELP: &str = "commands: open | close | search <term> | list | select <id> | form | \
set <key> <value> | generate | regen | history | recall <n> | save <path> | status | quit";

fn repl(session: &mut Session) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout();
    println!("{}", REPL_HELP);

    loop {
        session.pump();
        write!(out, "memekit> ")?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let result = match cmd {
            "quit" | "exit" => break,
            "help" => {
                println!("{}", REPL_HELP);
                Ok(())
            }
            "open" => session.dispatch(Command::OpenCatalog).map(|_| {
                session.wait_idle();
                print_list(session);
            }),
            "close" => session.dispatch(Command::CloseCatalog),
            "search" => session
                .dispatch(Command::Search(rest.to_string()))
                .map(|_| print_list(session)),
            "list" => {
                print_list(session);
                Ok(())
            }
            "select" => session
                .dispatch(Command::Select(rest.to_string()))
                .map(|_| print_selected(session)),
            "form" => {
                print_selected(session);
                Ok(())
            }
            "set" => {
                let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
                session.dispatch(Command::SetField {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "generate" | "gen" | "regen" => {
                let command = if cmd == "regen" { Command::Regenerate } else { Command::Generate };
                match session.dispatch(command) {
                    Ok(()) => {
                        if let Some(notice) = session.controller().notice() {
                            println!("{}", notice);
                        }
                        session.wait_idle();
                        if let Err(e) = report_render(session) {
                            eprintln!("{:#}", e);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            "history" => {
                for (i, entry) in session.controller().history().iter().enumerate() {
                    println!("{}  {}  {}", i, entry.name, entry.url);
                }
                Ok(())
            }
            "recall" => match rest.parse::<usize>() {
                Ok(index) => session.dispatch(Command::Recall(index)).map(|_| {
                    if let Some(shown) = session.controller().shown() {
                        println!("{}", shown.url());
                    }
                }),
                Err(_) => {
                    eprintln!("usage: recall <n>");
                    Ok(())
                }
            },
            "save" => session.download(&PathBuf::from(rest)).map(|_| println!("saved {}", rest)),
            "status" => {
                let c = session.controller();
                println!(
                    "phase: {:?}  catalog: {:?}  selected: {}",
                    c.phase(),
                    c.catalog_status(),
                    c.selected().map(|t| t.name.as_str()).unwrap_or("-")
                );
                if c.phase() == Phase::Failed || c.phase() == Phase::Generating {
                    if let Some(notice) = c.notice() {
                        println!("{}", notice);
                    }
                }
                Ok(())
            }
            other => {
                eprintln!("unknown command {:?}; {}", other, REPL_HELP);
                Ok(())
            }
        };

        if let Err(e) = result {
            if matches!(e, memekit::Error::NothingToDownload) {
                eprintln!("{}", session.controller().generate_first_notice());
            } else {
                eprintln!("error: {}", e);
            }
            let _ = session.controller_mut().take_error();
        }
    }
    Ok(())
}
