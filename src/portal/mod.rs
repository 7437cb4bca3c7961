//! Access to the Derytelecom customer extranet.
//!
//! The extranet is a plain PHP site with no API. Everything is scraped:
//!
//! 1. **Login**: [`login`] reads the login form, whose input names change on
//!    every visit.
//! 2. **Session**: [`session`] keeps the session cookie, fetches pages and
//!    notices when the extranet logs us out.
//! 3. **Content**: [`content`] pulls values out of the fetched pages by
//!    looking for the labels written next to them.
//!
//! # Typical use
//!
//! ```ignore
//! let mut session = Session::connect(&settings, "jdoe", "hunter2").await?;
//! let available = session.internet_traffic().await?.available();
//! session.disconnect().await;
//! ```

pub mod content;
pub mod login;
pub mod session;

pub use session::with_session;
