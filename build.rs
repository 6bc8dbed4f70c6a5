fn main() {
    // Embed the Windows icon and manifest when they are present
    #[cfg(target_os = "windows")]
    {
        let mut res = winres::WindowsResource::new();
        let mut has_resources = false;

        if std::path::Path::new("app.manifest").exists() {
            res.set_manifest_file("app.manifest");
            has_resources = true;
        }
        if std::path::Path::new("assets/icon.ico").exists() {
            res.set_icon("assets/icon.ico");
            has_resources = true;
        }

        if has_resources {
            if let Err(e) = res.compile() {
                eprintln!("Warning: failed to embed Windows resources: {}", e);
            }
        }
    }
}
