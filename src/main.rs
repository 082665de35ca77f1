use std::{fs::File, io::stdout, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{LevelFilter, WriteLogger};

use facybox::event_source::KeyboardEventSource;
use facybox::main_app::{App, run_app_with_event_source};
use facybox::page::Page;
use facybox::panic_handler;
use facybox::settings::{self, SettingsOverride};
use facybox::Facybox;

/// Browse the lightbox links of an HTML page in the terminal.
#[derive(Parser, Debug)]
#[command(name = "facybox", version, about)]
struct Args {
    /// HTML page whose rel="facybox" links are listed
    page: PathBuf,

    /// Settings file (default: ~/.facybox_settings.yaml)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Ignore ESC and backdrop clicks while the popup is open
    #[arg(long)]
    modal: bool,

    /// Backdrop opacity between 0 and 1
    #[arg(long, value_name = "X")]
    opacity: Option<f32>,

    /// Do not dim the page behind the popup
    #[arg(long)]
    no_overlay: bool,

    /// Open this href right away
    #[arg(long, value_name = "HREF")]
    open: Option<String>,
}

impl Args {
    fn overrides(&self) -> SettingsOverride {
        SettingsOverride {
            opacity: self.opacity.map(Some),
            overlay: self.no_overlay.then_some(false),
            modal: self.modal.then_some(true),
            ..SettingsOverride::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    panic_handler::initialize_panic_handler();

    // html5ever is chatty at debug level
    WriteLogger::init(
        LevelFilter::Debug,
        simplelog::ConfigBuilder::new()
            .set_max_level(LevelFilter::Debug)
            .add_filter_ignore_str("html5ever")
            .build(),
        File::create("facybox.log")?,
    )?;

    info!("Starting facybox on {}", args.page.display());

    let settings = match args.settings.clone().or_else(settings::default_settings_path) {
        Some(path) => settings::load_settings(&path),
        None => settings::Settings::default(),
    };
    let page = Page::load(&args.page)
        .with_context(|| format!("Cannot open {}", args.page.display()))?;

    let mut facybox = Facybox::from_settings(settings, args.overrides());
    facybox.hooks_mut().on_any(|hook| info!("hook: {hook}"));

    let mut app = App::new(page, facybox);
    if let Some(href) = &args.open {
        app.open_href(href);
    }

    enable_raw_mode()?;
    let mut stdout = stdout();

    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;
    app.handle_resize(size.width, size.height);

    let mut event_source = KeyboardEventSource;
    let res = run_app_with_event_source(&mut terminal, &mut app, &mut event_source);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down facybox");
    Ok(())
}
