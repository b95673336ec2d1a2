use std::process::{Command, Stdio};

use log::{debug, info, warn};
use shell_words::split;
use which::which;

use crate::{is_valid_url, Config, NotesError, Result};

/// How a link ended up being opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMethod {
    Native,
    Browser(String),
}

/// Opens links with the platform handler, falling back to a browser command
#[derive(Debug, Clone)]
pub struct LinkOpener {
    browser_command: Option<String>,
    use_native: bool,
}

impl LinkOpener {
    pub fn new(config: &Config) -> Self {
        Self {
            browser_command: config.get_browser_command(),
            use_native: true,
        }
    }

    /// An opener that only uses `browser_command`
    pub fn browser_only(browser_command: impl Into<String>) -> Self {
        Self {
            browser_command: Some(browser_command.into()),
            use_native: false,
        }
    }

    pub fn open(&self, url: &str) -> Result<OpenMethod> {
        if !is_valid_url(url) {
            return Err(NotesError::OpenFailed {
                url: url.to_string(),
                message: "not an http(s) URL".to_string(),
            });
        }

        let native_error = if self.use_native {
            match open::that(url) {
                Ok(()) => {
                    info!("Opened {} with the system handler", url);
                    return Ok(OpenMethod::Native);
                }
                Err(e) => {
                    warn!("System handler could not open {}: {}", url, e);
                    e.to_string()
                }
            }
        } else {
            "system handler disabled".to_string()
        };

        let Some(browser) = &self.browser_command else {
            return Err(NotesError::OpenFailed {
                url: url.to_string(),
                message: format!("{}; no browser configured", native_error),
            });
        };

        self.launch_browser(browser, url)?;
        Ok(OpenMethod::Browser(browser.clone()))
    }

    fn launch_browser(&self, browser_cmd: &str, url: &str) -> Result<()> {
        let open_failed = |message: String| NotesError::OpenFailed {
            url: url.to_string(),
            message,
        };

        let args = split(browser_cmd)
            .map_err(|e| open_failed(format!("Failed to parse browser command: {}", e)))?;
        let Some((program, rest)) = args.split_first() else {
            return Err(open_failed("Empty browser command".to_string()));
        };

        let program = which(program)
            .map_err(|e| open_failed(format!("Browser {} not found: {}", program, e)))?;

        debug!("Launching {} for {}", program.display(), url);
        Command::new(&program)
            .args(rest)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| open_failed(format!("Failed to launch {}: {}", program.display(), e)))?;

        info!("Opened {} with {}", url, browser_cmd);
        Ok(())
    }
}
