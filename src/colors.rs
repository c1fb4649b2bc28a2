//! Terminal color control
//!
//! `NO_COLOR` (any value) disables colors, `CLICOLOR_FORCE` (non-zero)
//! forces them, `CLICOLOR=0` disables them. Otherwise colors follow whether
//! stdout is a terminal.
use colored::control;

/// Configure `colored` from the environment. Call once at startup.
pub fn init_colors() {
    control::set_override(colors_enabled(
        |var| std::env::var(var).ok(),
        std::io::IsTerminal::is_terminal(&std::io::stdout()),
    ));
}

fn colors_enabled(lookup: impl Fn(&str) -> Option<String>, is_tty: bool) -> bool {
    if lookup("NO_COLOR").is_some() {
        return false;
    }
    if lookup("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        return true;
    }
    if lookup("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }
    is_tty
}
