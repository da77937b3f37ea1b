use std::io::stdout;

use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

pub mod validation;

pub fn print_success(message: &str) -> anyhow::Result<()> {
    execute!(stdout(), SetForegroundColor(Color::Green), Print(format!("✅ {message}\n")), ResetColor)?;
    Ok(())
}

pub fn print_notice(message: &str) -> anyhow::Result<()> {
    execute!(stdout(), SetForegroundColor(Color::Yellow), Print(format!("{message}\n")), ResetColor)?;
    Ok(())
}
