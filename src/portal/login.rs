//! Login form scraping.
//!
//! The extranet renames its login inputs every time the login page is
//! served, so the field names are read from the page instead of being
//! hard-coded. The first two `<input>` elements of the first `<form>` are the
//! username and password fields; the form's `action` is the page that
//! receives the credentials.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static FORM: Lazy<Selector> = Lazy::new(|| Selector::parse("form").expect("valid selector"));
static INPUT: Lazy<Selector> = Lazy::new(|| Selector::parse("input").expect("valid selector"));
static LOGOUT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="logout=1"]"#).expect("valid selector"));

/// The parts of the login form needed to post credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Relative URL the credentials are posted to.
    pub action: String,
    /// Name of the username input.
    pub login_field: String,
    /// Name of the password input.
    pub password_field: String,
}

impl LoginForm {
    /// Scrape the login form out of the login page.
    ///
    /// # Arguments
    ///
    /// * `html` - The body of the extranet root page
    ///
    /// # Returns
    ///
    /// The form's `action` and the names of its first two inputs.
    ///
    /// # Errors
    ///
    /// [`Error::LoginFormNotFound`] if the page has no form, the form has no
    /// `action`, or it does not start with two named inputs.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let form = LoginForm::parse(r#"<form action="auth.php"><input name="u_1"><input name="p_2"></form>"#)?;
    /// assert_eq!(form.password_field, "p_2");
    /// ```
    pub fn parse(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let form = document
            .select(&FORM)
            .next()
            .ok_or(Error::LoginFormNotFound("the page has no form"))?;

        let action = form
            .value()
            .attr("action")
            .ok_or(Error::LoginFormNotFound("the form has no action"))?
            .to_string();

        let mut names = form.select(&INPUT).take(2).map(|input| input.value().attr("name"));
        let (Some(Some(login_field)), Some(Some(password_field))) = (names.next(), names.next())
        else {
            return Err(Error::LoginFormNotFound(
                "the form does not start with two named inputs",
            ));
        };

        let form = LoginForm {
            action,
            login_field: login_field.to_string(),
            password_field: password_field.to_string(),
        };
        debug!(action = %form.action, login_field = %form.login_field, password_field = %form.password_field, "Scraped login form");
        Ok(form)
    }
}

/// Whether the page is the extranet login page, i.e. we are not (or no
/// longer) logged in.
///
/// Logged-in pages can hold password inputs too (password change, Wi-Fi key),
/// so a page only counts as the login page when it has no logout link and one
/// of its forms is exactly a username input followed by a password input,
/// buttons and hidden inputs aside.
///
/// # Arguments
///
/// * `html` - The page body as returned by the extranet
///
/// # Returns
///
/// `true` if the page asks for the username and password.
///
/// # Examples
///
/// ```ignore
/// let login = r#"<form action="auth.php"><input name="u"><input type="password" name="p"></form>"#;
/// assert!(looks_like_login_page(login));
/// assert!(!looks_like_login_page(r#"<a href="index.php?logout=1">Logout</a>"#));
/// ```
pub fn looks_like_login_page(html: &str) -> bool {
    let document = Html::parse_document(html);
    if document.select(&LOGOUT_LINK).next().is_some() {
        return false;
    }
    document.select(&FORM).any(is_credentials_form)
}

fn is_credentials_form(form: ElementRef<'_>) -> bool {
    let fields: Vec<String> = form
        .select(&INPUT)
        .map(|input| input.value().attr("type").unwrap_or("text").to_ascii_lowercase())
        .filter(|kind| !matches!(kind.as_str(), "submit" | "button" | "image" | "reset" | "hidden"))
        .collect();
    matches!(fields.as_slice(), [login, password] if login != "password" && password == "password")
}
