//! File utility functions

use std::path::PathBuf;

/// Expand `~` and make a relative path absolute against the working directory.
///
/// Paths are not canonicalized; `..` components are kept as written.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    let expanded = match path {
        "" => PathBuf::from("."),
        "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => match path.strip_prefix("~/").zip(dirs::home_dir()) {
            Some((rest, home)) => home.join(rest),
            None => PathBuf::from(path),
        },
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_unchanged() {
        assert_eq!(
            expand_path("  /etc/meterstore.json "),
            PathBuf::from("/etc/meterstore.json")
        );
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let result = expand_path("conf/meterstore.json");
        assert!(result.is_absolute());
        assert!(result.ends_with("conf/meterstore.json"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let result = expand_path("~/.meterstore/meterstore.json");
        assert!(!result.to_string_lossy().contains('~'));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join(".meterstore/meterstore.json"));
            assert_eq!(expand_path("~"), home);
        }
    }

    #[test]
    fn test_empty_is_current_dir() {
        assert!(expand_path("   ").is_absolute());
    }
}
