use crate::browser;
use crate::config::APP_NAME;
use crate::startup::ShutdownReason;
use std::sync::mpsc::Sender;
use tauri::image::Image;
use tauri::menu::{MenuBuilder, MenuItemBuilder};
use tauri::tray::{MouseButton, TrayIconBuilder, TrayIconEvent};

const MENU_OPEN: &str = "open";
const MENU_QUIT: &str = "quit";

pub fn run(url: String, quit: Sender<ShutdownReason>) -> anyhow::Result<()> {
    let app = tauri::Builder::default()
        .setup(move |app| {
            #[cfg(target_os = "macos")]
            app.set_activation_policy(tauri::ActivationPolicy::Accessory);

            install_tray(app, url, quit)?;
            Ok(())
        })
        .build(tauri::generate_context!())?;

    tracing::info!("tray event loop started");
    app.run(|_app, event| {
        // No windows exist; only an explicit exit code may end the loop.
        if let tauri::RunEvent::ExitRequested { api, code, .. } = event {
            if code.is_none() {
                api.prevent_exit();
            }
        }
    });
    Ok(())
}

fn install_tray(
    app: &tauri::App,
    url: String,
    quit: Sender<ShutdownReason>,
) -> Result<(), Box<dyn std::error::Error>> {
    let open = MenuItemBuilder::with_id(MENU_OPEN, format!("{} öffnen", APP_NAME)).build(app)?;
    let exit = MenuItemBuilder::with_id(MENU_QUIT, "Beenden").build(app)?;
    let menu = MenuBuilder::new(app)
        .item(&open)
        .separator()
        .item(&exit)
        .build()?;

    let click_url = url.clone();
    TrayIconBuilder::with_id("main")
        .icon(Image::from_bytes(include_bytes!("../icons/icon.png"))?)
        .menu(&menu)
        .tooltip(APP_NAME)
        .on_menu_event(move |_app, event| match event.id().as_ref() {
            MENU_OPEN => browser::open_now(&url),
            MENU_QUIT => {
                tracing::info!("quit requested from tray");
                if quit.send(ShutdownReason::UserQuit).is_err() {
                    tracing::warn!("shutdown channel closed, exiting directly");
                    crate::flush_logs();
                    std::process::exit(0);
                }
            }
            _ => {}
        })
        .on_tray_icon_event(move |_tray, event| {
            if let TrayIconEvent::DoubleClick {
                button: MouseButton::Left,
                ..
            } = event
            {
                browser::open_now(&click_url);
            }
        })
        .build(app)?;

    Ok(())
}
