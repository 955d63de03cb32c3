use std::path::PathBuf;

#[cfg(unix)]
pub fn mpv_socket_name() -> String {
    format!("{}/clawfm-mpv.sock", std::env::temp_dir().display())
}

#[cfg(windows)]
pub fn mpv_socket_name() -> String {
    "clawfm-mpv".to_string()
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
    // XDG-style on unix, including macOS, so every platform reads the same layout
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("clawfm")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clawfm")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("clawfm")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clawfm")
    }
}

#[cfg(unix)]
pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

#[cfg(windows)]
pub fn mpv_binary_name() -> &'static str {
    "mpv.exe"
}

/// Find the mpv binary: `MPV_PATH` override, beside the current exe, then PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MPV_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    let exe_name = mpv_binary_name();

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(exe_name);
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }

    let path = std::env::var("PATH").ok()?;
    #[cfg(unix)]
    let separator = ":";
    #[cfg(windows)]
    let separator = ";";

    path.split(separator)
        .map(|dir| PathBuf::from(dir).join(exe_name))
        .find(|p| p.exists())
}
