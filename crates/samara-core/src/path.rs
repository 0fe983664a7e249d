use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Resolve the mind-root directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. SAMARA_MIND_PATH environment variable
/// 3. MIND_PATH environment variable
/// 4. ~/.claude-mind
pub fn resolve_mind_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    for var in ["SAMARA_MIND_PATH", "MIND_PATH"] {
        if let Ok(env_path) = std::env::var(var) {
            if !env_path.is_empty() {
                return Ok(expand_tilde(&env_path));
            }
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".claude-mind"));
    }

    Err(Error::Config(
        "Could not determine mind path: no HOME directory found".to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// The on-disk layout under a mind root. Every component resolves its
/// files through this table so the directory shape lives in one place.
#[derive(Debug, Clone)]
pub struct MindPaths {
    root: PathBuf,
}

impl MindPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(explicit_path: Option<&str>) -> Result<Self> {
        Ok(Self::new(resolve_mind_path(explicit_path)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn stream_dir(&self) -> PathBuf {
        self.root.join("stream")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn threads_file(&self) -> PathBuf {
        self.state_dir().join("threads.json")
    }

    pub fn scheduler_state_file(&self) -> PathBuf {
        self.state_dir().join("scheduler-state.json")
    }

    pub fn last_trigger_file(&self) -> PathBuf {
        self.state_dir().join("last-proactive-trigger.txt")
    }

    pub fn evaluations_file(&self) -> PathBuf {
        self.state_dir().join("trigger-evaluations.jsonl")
    }

    pub fn questions_file(&self) -> PathBuf {
        self.state_dir().join("asked_questions.jsonl")
    }

    pub fn hot_digest_file(&self) -> PathBuf {
        self.state_dir().join("hot-digest.md")
    }

    pub fn patterns_file(&self) -> PathBuf {
        self.state_dir().join("patterns.json")
    }

    pub fn calendar_cache_file(&self) -> PathBuf {
        self.state_dir().join("calendar-cache.json")
    }

    pub fn queue_file(&self) -> PathBuf {
        self.state_dir().join("proactive-queue").join("queue.json")
    }

    pub fn triggers_file(&self) -> PathBuf {
        self.state_dir().join("triggers").join("triggers.json")
    }

    pub fn senses_dir(&self) -> PathBuf {
        self.root.join("senses")
    }

    pub fn episodes_dir(&self) -> PathBuf {
        self.root.join("memory").join("episodes")
    }
}
