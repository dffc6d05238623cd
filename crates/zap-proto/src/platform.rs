use std::path::PathBuf;

#[cfg(unix)]
pub fn mpv_socket_name() -> String {
    format!("{}/tvzap-mpv.sock", std::env::temp_dir().display())
}

#[cfg(windows)]
pub fn mpv_socket_name() -> String {
    "tvzap-mpv".to_string()
}

#[cfg(unix)]
pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_name())
}

#[cfg(windows)]
pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server=\\\\.\\pipe\\{}", mpv_socket_name())
}

pub fn data_dir() -> PathBuf {
    // Use ~/.local/share/tvzap/ on unix (XDG, also on macOS for
    // consistency).
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("tvzap")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tvzap")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("tvzap")
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tvzap")
    }
}

#[cfg(unix)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv"]
}

#[cfg(windows)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv.exe", "mpv"]
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    #[cfg(unix)]
    let sep = ":";
    #[cfg(windows)]
    let sep = ";";
    for dir in path.split(sep) {
        for name in names {
            let p = PathBuf::from(dir).join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Find the mpv binary: beside the current exe first (bundled
/// distribution), then on PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            for name in mpv_binary_names() {
                let p = dir.join(name);
                if p.exists() {
                    return Some(p);
                }
            }
        }
    }
    find_on_path(mpv_binary_names())
}
