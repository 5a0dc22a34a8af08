//! Headless Chrome render backend.
//!
//! | Operation | Implementation |
//! |---|---|
//! | **Open** | `Browser::new` with proxy and `--user-agent`, one tab |
//! | **Navigate** | `navigate_to` + `wait_until_navigated` |
//! | **Find elements** | `document.querySelectorAll(sel).length` |
//! | **Click** | `Tab::find_elements` + `Element::click` (real mouse event), then settle navigation |
//! | **Attribute** | `getAttribute` on the indexed match, JSON-encoded |
//! | **Back** | `history.back()` + `wait_until_navigated` |
//! | **Teardown** | `Drop`: close the tab, then the browser process dies with `Browser` |
//!
//! Every session launches its own Chrome process. That is what makes the
//! proxy and user agent per-session: both are process launch flags.

use super::backend::{ElementRef, RenderSession, Renderer, SessionError};
use crate::config::BrowserConfig;
use crate::identity::Identity;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::Duration;

/// Launches one headless Chrome per session.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    config: BrowserConfig,
}

impl ChromeRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl Renderer for ChromeRenderer {
    type Session = ChromeSession;

    fn open(&self, identity: &Identity) -> Result<ChromeSession, SessionError> {
        let user_agent_arg = identity
            .user_agent
            .as_ref()
            .map(|ua| OsString::from(format!("--user-agent={ua}")));
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
        ];
        if let Some(arg) = &user_agent_arg {
            args.push(arg.as_os_str());
        }

        let [width, height] = self.config.window_size;
        let options = LaunchOptions {
            headless: self.config.headless,
            sandbox: self.config.sandbox,
            window_size: Some((width, height)),
            idle_browser_timeout: Duration::from_secs(self.config.idle_timeout_secs),
            proxy_server: identity.proxy.as_deref(),
            args,
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        tracing::debug!(%identity, "render session opened");

        Ok(ChromeSession {
            tab,
            _browser: browser,
        })
    }
}

/// A live Chrome process with one tab.
///
/// Field order matters: the tab is closed before the browser is dropped.
pub struct ChromeSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromeSession {
    /// Evaluate a JS expression that produces a primitive value.
    fn eval(&self, expression: &str) -> Result<serde_json::Value, SessionError> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }
}

impl RenderSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementRef>, SessionError> {
        let count = self
            .eval(&count_expression(selector))?
            .as_u64()
            .unwrap_or(0) as usize;
        Ok((0..count)
            .map(|index| ElementRef {
                selector: selector.to_string(),
                index,
            })
            .collect())
    }

    fn click(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        let missing = || SessionError::ElementMissing {
            selector: element.selector.clone(),
            index: element.index,
        };
        let elements = self
            .tab
            .find_elements(&element.selector)
            .map_err(|_| missing())?;
        let target = elements.get(element.index).ok_or_else(missing)?;
        target
            .click()
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        // Settle any navigation the click started before the caller probes
        self.tab
            .wait_until_navigated()
            .map(|_| ())
            .map_err(|e| SessionError::Interaction(e.to_string()))
    }

    fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let payload = self.eval(&attribute_expression(element, name))?;
        parse_attribute_payload(&payload).ok_or_else(|| SessionError::ElementMissing {
            selector: element.selector.clone(),
            index: element.index,
        })
    }

    fn back(&mut self) -> Result<(), SessionError> {
        self.eval("history.back()")?;
        self.tab
            .wait_until_navigated()
            .map(|_| ())
            .map_err(|e| SessionError::Interaction(e.to_string()))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::debug!(error = %e, "closing tab failed; browser is killed regardless");
        }
        tracing::debug!("render session closed");
    }
}

/// Quote a string as a JS string literal.
fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JS string literal
    serde_json::Value::String(value.to_string()).to_string()
}

fn count_expression(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", js_string(selector))
}

/// Expression returning `JSON.stringify({value})` for the element, or the
/// string `"null"` when the element does not exist.
fn attribute_expression(element: &ElementRef, name: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelectorAll({})[{}]; \
         return JSON.stringify(el ? {{ value: el.getAttribute({}) }} : null); }})()",
        js_string(&element.selector),
        element.index,
        js_string(name)
    )
}

/// Decode the result of [`attribute_expression`].
///
/// Outer `None`: the element was not there. Inner `None`: no such attribute.
fn parse_attribute_payload(payload: &serde_json::Value) -> Option<Option<String>> {
    let decoded: serde_json::Value = serde_json::from_str(payload.as_str()?).ok()?;
    let object = decoded.as_object()?;
    Some(object.get("value").and_then(|v| v.as_str()).map(str::to_string))
}
