use std::fs;
use std::path::{Path, PathBuf};

const ENV_CANDIDATES: [&str; 2] = ["thinkrelay.env", ".env"];

pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Splits one `KEY=value` assignment; blank lines and `#`/`;` comments yield `None`.
fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);
    if matches!(line.chars().next(), None | Some('#' | ';')) {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim_end();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim())))
}

/// Quoted values are taken verbatim; bare values lose a trailing ` #` comment,
/// so a `#` inside a key such as `sk-a#b` survives.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
        .split_once(" #")
        .map_or(value, |(bare, _)| bare.trim_end())
}

fn find_env_file_in_dir(dir: &Path) -> Option<PathBuf> {
    ENV_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Applies `path` to the process environment. Variables that are already set win.
/// Returns how many variables were applied.
pub fn apply_env_file(path: &Path) -> usize {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            log::warn!(
                "event=env_file_unreadable path={} err={}",
                path.display(),
                err
            );
            return 0;
        }
    };
    let mut applied = 0usize;
    for (key, value) in text.lines().filter_map(parse_assignment) {
        if std::env::var_os(key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
        applied += 1;
    }
    applied
}

/// Loads the first env file found next to the executable, then in the working directory.
pub fn load_env_files() {
    let mut dirs = vec![exe_dir()];
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.contains(&cwd) {
            dirs.push(cwd);
        }
    }
    let Some(path) = dirs.iter().find_map(|dir| find_env_file_in_dir(dir)) else {
        return;
    };
    let applied = apply_env_file(&path);
    log::info!(
        "event=env_file_loaded path={} applied={}",
        path.display(),
        applied
    );
}
