// Prevents an additional console window on Windows in release builds of the tray app.
#![cfg_attr(all(not(debug_assertions), feature = "tray"), windows_subsystem = "windows")]

fn main() {
    let status = benutzerverwaltung_lib::run();
    std::process::exit(status.code());
}
