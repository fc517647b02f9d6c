//! Home-directory resolution and path-alias rewriting.
//!
//! Models frequently emit caller-relative path forms (`~`, `/home`,
//! `/home/<name>/...`) that do not exist verbatim on the host. These are
//! rewritten to the caller's actual home directory before a tool call is
//! dispatched.

#[derive(Debug, Clone)]
pub struct HomeDir {
    home: String,
}

impl HomeDir {
    /// Resolve the home directory from an override or `$HOME`.
    pub fn resolve(override_dir: Option<String>) -> Self {
        let home = override_dir
            .or_else(|| std::env::var("HOME").ok())
            .unwrap_or_else(|| "/".to_string());
        Self { home }
    }

    pub fn home_directory(&self) -> &str {
        &self.home
    }

    /// Rewrite home-directory aliases to the actual home path.
    pub fn translate_path(&self, path: &str) -> String {
        if path == "/home" || path == "/home/" {
            return self.home.clone();
        }
        if let Some(rest) = path.strip_prefix("/home/") {
            // Replace the /home/<name> prefix, keeping everything after it.
            return match rest.find('/') {
                Some(index) => format!("{}{}", self.home, &rest[index..]),
                None => self.home.clone(),
            };
        }
        self.expand_tilde(path)
    }

    /// Expand a leading `~` or `~/` to the home directory.
    pub fn expand_tilde(&self, path: &str) -> String {
        if path == "~" || path == "~/" {
            return self.home.clone();
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return format!("{}/{}", self.home, rest);
        }
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> HomeDir {
        HomeDir::resolve(Some("/users/alice".to_string()))
    }

    #[test]
    fn test_bare_home_alias() {
        assert_eq!(home().translate_path("/home"), "/users/alice");
        assert_eq!(home().translate_path("/home/"), "/users/alice");
    }

    #[test]
    fn test_home_user_prefix_replaced() {
        assert_eq!(
            home().translate_path("/home/bob/docs/notes.txt"),
            "/users/alice/docs/notes.txt"
        );
        assert_eq!(home().translate_path("/home/bob"), "/users/alice");
    }

    #[test]
    fn test_tilde_expansion() {
        assert_eq!(home().translate_path("~"), "/users/alice");
        assert_eq!(home().translate_path("~/"), "/users/alice");
        assert_eq!(home().translate_path("~/code"), "/users/alice/code");
    }

    #[test]
    fn test_unrelated_paths_untouched() {
        assert_eq!(home().translate_path("/tmp/file"), "/tmp/file");
        assert_eq!(home().translate_path("relative/path"), "relative/path");
        // A path merely containing /home deeper in is not an alias.
        assert_eq!(home().translate_path("/var/home/x"), "/var/home/x");
    }

    #[test]
    fn test_resolve_falls_back_to_env() {
        let resolved = HomeDir::resolve(None);
        assert!(!resolved.home_directory().is_empty());
    }
}
