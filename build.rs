fn main() {
    // The tray build embeds tauri.conf.json and the icons; the plain build
    // needs no codegen.
    #[cfg(feature = "tray")]
    tauri_build::build();
}
