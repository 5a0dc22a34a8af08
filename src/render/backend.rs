//! Render backend traits and shared types.
//!
//! A [`Renderer`] opens [`RenderSession`]s; a session is one browser bound to
//! one [`Identity`], alive for exactly one pagination cycle. Teardown is
//! `Drop`: whatever path a cycle leaves by, the session goes out of scope and
//! the browser goes with it.
//!
//! The production implementation is
//! [`ChromeRenderer`](super::chrome_backend::ChromeRenderer). The collector
//! only sees these traits, so tests drive it with a scripted backend.

use crate::identity::Identity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("No element #{index} matches {selector:?}")]
    ElementMissing { selector: String, index: usize },
    #[error("Page interaction failed: {0}")]
    Interaction(String),
}

/// Handle to one element of a page: the `index`-th match of `selector`.
///
/// Handles are re-resolved on every use, so a handle taken before navigating
/// away and back still points at the same position in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

/// One live page-automation session.
pub trait RenderSession {
    /// Load `url` and wait for the navigation to complete.
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// All elements currently matching `selector`. No match is an empty list,
    /// not an error.
    fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementRef>, SessionError>;

    /// Click the element.
    fn click(&mut self, element: &ElementRef) -> Result<(), SessionError>;

    /// Read an attribute of the element; `None` when the attribute is absent.
    fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Go back one entry in the session history.
    fn back(&mut self) -> Result<(), SessionError>;
}

/// Factory for render sessions.
pub trait Renderer: Sync {
    type Session: RenderSession;

    /// Launch a fresh session configured with `identity`.
    fn open(&self, identity: &Identity) -> Result<Self::Session, SessionError>;
}
