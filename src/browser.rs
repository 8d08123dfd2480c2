//! Headless Chrome implementation of [`PageSession`].
//!
//! Sandbox is disabled automatically inside containers (detected via
//! /.dockerenv). The Chrome binary comes from the config, then the
//! `CHROME_PATH` env var, then the system default.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Browser::{SetDownloadBehavior, SetDownloadBehaviorBehaviorOption};
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};

use crate::config::CrawlConfig;
use crate::error::TransportError;
use crate::records::RawResultBlock;
use crate::results_page::{self, ROW_SELECTOR};
use crate::session::PageSession;

const SEARCH_INPUT: &str = "#query";
const SEARCH_BUTTON: &str = "#btnSearch";
const SETTLE_POLL: Duration = Duration::from_millis(250);
const MAX_SETTLE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ChromeSettings {
    pub base_url: String,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub timeout: Duration,
    /// Absolute directory for downloaded extracts.
    pub download_dir: Option<PathBuf>,
}

impl ChromeSettings {
    pub fn from_config(config: &CrawlConfig, download_dir: Option<PathBuf>) -> Self {
        ChromeSettings {
            base_url: config.base_url.clone(),
            headless: config.browser.headless,
            chrome_path: config.browser.chrome_path.clone(),
            timeout: Duration::from_secs(config.browser.timeout_secs),
            download_dir,
        }
    }
}

pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
    settings: ChromeSettings,
}

impl ChromeSession {
    /// Start Chrome and open the registry search page.
    pub fn launch(settings: &ChromeSettings) -> Result<Self, TransportError> {
        let is_container = Path::new("/.dockerenv").exists();
        let chrome_path = settings
            .chrome_path
            .clone()
            .or_else(|| std::env::var("CHROME_PATH").ok().map(PathBuf::from));

        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .sandbox(!is_container)
            .path(chrome_path)
            .idle_browser_timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::Browser(format!("Failed to build Chrome launch options: {}", e)))?;

        let browser = Browser::new(options).map_err(|e| classify("launch Chrome", e))?;
        let tab = browser.new_tab().map_err(|e| classify("open tab", e))?;
        tab.set_default_timeout(settings.timeout);

        if let Some(dir) = &settings.download_dir {
            tab.call_method(SetDownloadBehavior {
                behavior: SetDownloadBehaviorBehaviorOption::Allow,
                browser_context_id: None,
                download_path: Some(dir.to_string_lossy().into_owned()),
                events_enabled: None,
            })
            .map_err(|e| classify("set download directory", e))?;
        }

        tab.navigate_to(&settings.base_url)
            .map_err(|e| classify("open search page", e))?
            .wait_until_navigated()
            .map_err(|e| classify("load search page", e))?;
        info!("Browser session ready at {}", settings.base_url);

        Ok(ChromeSession {
            _browser: browser,
            tab,
            settings: settings.clone(),
        })
    }

    fn content(&self) -> Result<String, TransportError> {
        self.tab.get_content().map_err(|e| classify("read page", e))
    }

    fn first_body(&self) -> Option<String> {
        self.content()
            .ok()
            .and_then(|html| results_page::parse_blocks(&html).into_iter().next())
            .map(|b| b.body_text)
    }

    /// Results are swapped in by script, so wait until the first result
    /// differs from what was shown before the click.
    fn wait_for_new_results(&self, previous: Option<String>) {
        let deadline = Instant::now() + self.settings.timeout.min(MAX_SETTLE);
        while Instant::now() < deadline {
            let current = self.first_body();
            if current.is_some() && current != previous {
                return;
            }
            thread::sleep(SETTLE_POLL);
        }
        debug!("Result list did not change before the settle timeout");
    }
}

impl PageSession for ChromeSession {
    fn submit_search(&mut self, query: &str) -> Result<(), TransportError> {
        let previous = self.first_body();
        self.tab
            .evaluate(&format!("document.querySelector('{}').value = ''", SEARCH_INPUT), false)
            .map_err(|e| classify("clear search field", e))?;
        self.tab
            .wait_for_element(SEARCH_INPUT)
            .map_err(|e| classify("find search field", e))?
            .type_into(query)
            .map_err(|e| classify("type query", e))?;
        self.tab
            .wait_for_element(SEARCH_BUTTON)
            .map_err(|e| classify("find search button", e))?
            .click()
            .map_err(|e| classify("submit search", e))?;
        self.wait_for_new_results(previous);
        Ok(())
    }

    fn navigate_to_page(&mut self, page: u32) -> Result<bool, TransportError> {
        let selector = format!("[data-page=\"{}\"]", page);
        let previous = self.first_body();
        let link = match self.tab.find_element(&selector) {
            Ok(link) => link,
            Err(e) => {
                return match classify("find page link", e) {
                    TransportError::ElementNotFound(_) => Ok(false),
                    other => Err(other),
                }
            }
        };
        link.click().map_err(|e| classify("open page", e))?;
        self.wait_for_new_results(previous);
        Ok(true)
    }

    fn read_result_blocks(&mut self) -> Result<Vec<RawResultBlock>, TransportError> {
        Ok(results_page::parse_blocks(&self.content()?))
    }

    fn read_total_pages(&mut self) -> Result<Option<u32>, TransportError> {
        Ok(results_page::parse_total_pages(&self.content()?))
    }

    fn request_extract(&mut self, index: usize) -> Result<bool, TransportError> {
        let rows = match self.tab.find_elements(ROW_SELECTOR) {
            Ok(rows) => rows,
            Err(e) => {
                return match classify("find results", e) {
                    TransportError::ElementNotFound(_) => Ok(false),
                    other => Err(other),
                }
            }
        };
        let row = match rows.get(index) {
            Some(row) => row,
            None => return Ok(false),
        };
        row.find_element("button")
            .map_err(|e| classify("find extract button", e))?
            .click()
            .map_err(|e| classify("request extract", e))?;
        Ok(true)
    }

    fn is_responsive(&mut self) -> bool {
        self.tab.evaluate("1 + 1", false).is_ok()
    }

    fn recreate(&self) -> Result<Self, TransportError> {
        ChromeSession::launch(&self.settings)
    }
}

/// Map a headless_chrome failure onto the transport taxonomy.
pub fn classify(context: &str, err: anyhow::Error) -> TransportError {
    let message = format!("{}: {:#}", context, err);
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("never came") {
        TransportError::Timeout(message)
    } else if lower.contains("invalid session")
        || lower.contains("connection closed")
        || lower.contains("channel")
        || lower.contains("target closed")
        || lower.contains("no such target")
    {
        TransportError::SessionLost(message)
    } else if lower.contains("unresponsive") || lower.contains("not responding") {
        TransportError::Unresponsive(message)
    } else if lower.contains("element") || lower.contains("could not find node") {
        TransportError::ElementNotFound(message)
    } else {
        TransportError::Browser(message)
    }
}
