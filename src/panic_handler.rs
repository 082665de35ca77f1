use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use log::error;
use std::io::stdout;
use std::panic;

/// Installs a hook that puts the terminal back into a usable state before
/// reporting the panic. Debug builds get a full backtrace, release builds the
/// human-panic crash report.
pub fn initialize_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        restore_terminal();
        error!("Panic: {panic_info}");

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .create_panic_handler()(panic_info);
        }

        #[cfg(not(debug_assertions))]
        {
            use human_panic::{handle_dump, metadata, print_msg};
            let meta = metadata!();
            let file_path = handle_dump(&meta, panic_info);
            let _ = print_msg(file_path, &meta);
        }

        std::process::exit(1);
    }));
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture);
}
