//! Page rendering: one disposable browser per pagination cycle.
//!
//! The module is split into:
//! - **Backend**: [`Renderer`] / [`RenderSession`] traits + [`SessionError`]
//! - **Chrome**: [`ChromeRenderer`], the `headless_chrome` implementation
//! - **Wait**: [`wait_until`], bounded polling used instead of fixed sleeps

pub mod backend;
pub mod chrome_backend;
pub mod wait;

pub use backend::{ElementRef, RenderSession, Renderer, SessionError};
pub use chrome_backend::ChromeRenderer;
pub use wait::{WaitPolicy, wait_until};
