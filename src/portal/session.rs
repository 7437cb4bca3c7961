//! An authenticated session with the extranet.
//!
//! A [`Session`] is created logged in by [`Session::connect`] and stays
//! usable until [`Session::disconnect`] is called or the extranet drops the
//! login on its own. Either way it cannot be reconnected; connect again to
//! get a fresh session.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{ContentParams, Lang, LOGOUT};
use crate::portal::content::{Content, InternetTraffic};
use crate::portal::login::{looks_like_login_page, LoginForm};
use crate::utils::truncate_for_log;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Page serving every extranet section once logged in.
pub const INDEX_PAGE_NAME: &str = "index.php";

#[derive(Debug)]
pub struct Session {
    client: Client,
    index_url: Url,
    lang: Lang,
    connected: bool,
}

impl Session {
    /// Log in to the extranet.
    ///
    /// Fetches the login page, scrapes the (randomly named) username and
    /// password inputs out of it and posts the credentials to the form's
    /// action. The extranet answers a rejected login with the login form
    /// again, which is reported as [`Error::BadCredentials`].
    ///
    /// # Arguments
    ///
    /// * `settings` - Base URL, language, timeout and user agent to use
    /// * `username` - The username to log in with
    /// * `password` - The password to log in with
    ///
    /// # Returns
    ///
    /// A connected [`Session`], or an error if the extranet cannot be reached
    /// ([`Error::Connection`]), answers with anything but HTTP 200
    /// ([`Error::HttpStatus`]), serves no usable login form
    /// ([`Error::LoginFormNotFound`]) or rejects the credentials.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut session = Session::connect(&Settings::default(), "jdoe", "hunter2").await?;
    /// assert!(session.is_connected());
    /// session.disconnect().await;
    /// ```
    #[instrument(level = "info", skip_all, fields(base_url = %settings.base_url))]
    pub async fn connect(settings: &Settings, username: &str, password: &str) -> Result<Self> {
        let base_url = base_url(&settings.base_url)?;
        let index_url = base_url.join(INDEX_PAGE_NAME)?;

        let client = Client::builder()
            .cookie_store(true)
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .build()?;

        let login_page = fetch_page(client.get(base_url.clone())).await?;
        let form = LoginForm::parse(&login_page)?;
        let auth_url = base_url.join(&form.action)?;

        let payload = [
            (form.login_field.as_str(), username),
            (form.password_field.as_str(), password),
        ];
        let landing_page = fetch_page(client.post(auth_url).form(&payload)).await?;
        if looks_like_login_page(&landing_page) {
            warn!("Login form shown again after posting the credentials");
            return Err(Error::BadCredentials);
        }

        info!("Connected to the extranet");
        Ok(Self {
            client,
            index_url,
            lang: settings.lang,
            connected: true,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Fetch the page selected by `params`.
    ///
    /// Pages are requested in the session language unless `params` names one.
    /// Getting the login form back means the extranet ended the session: the
    /// session is marked disconnected and [`Error::UnexpectedLogout`] returned.
    ///
    /// # Arguments
    ///
    /// * `params` - Page, sub page and optional language to request
    ///
    /// # Returns
    ///
    /// The parsed page, [`Error::NotConnected`] on a disconnected session, or
    /// [`Error::HttpStatus`] when the page is not served with HTTP 200.
    #[instrument(level = "info", skip_all, fields(params = ?params))]
    pub async fn get_content(&mut self, params: &ContentParams) -> Result<Content> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let query = params.query_pairs(self.lang);
        let page = fetch_page(self.client.get(self.index_url.clone()).query(&query)).await?;
        if looks_like_login_page(&page) {
            self.connected = false;
            warn!(page = %truncate_for_log(&page, 200), "Extranet served the login form; session was logged out");
            return Err(Error::UnexpectedLogout);
        }

        Ok(Content::parse(&page))
    }

    /// Fetch the Internet > Traffic page.
    pub async fn internet_traffic(&mut self) -> Result<InternetTraffic> {
        let content = self.get_content(&ContentParams::internet_traffic()).await?;
        Ok(content.into())
    }

    /// Log out. Does nothing if the session is already disconnected.
    ///
    /// The session counts as disconnected even when the logout request fails;
    /// the failure is only logged.
    #[instrument(level = "info", skip_all)]
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        match fetch_page(self.client.get(self.index_url.clone()).query(&[LOGOUT])).await {
            Ok(_) => info!("Disconnected from the extranet"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.connected {
            warn!("Session dropped while still logged in; the extranet will expire it");
        }
    }
}

/// Connect, run `f` on the session and disconnect, whatever `f` returned.
///
/// # Arguments
///
/// * `settings` - Base URL, timeout and default language
/// * `username` - Extranet login
/// * `password` - Extranet password
/// * `f` - Queries to run while connected
///
/// # Returns
///
/// What `f` returned, or the connection error when logging in failed. The
/// session is logged out in both cases where `f` ran.
///
/// # Examples
///
/// ```ignore
/// let traffic = with_session(&settings, "jdoe", "secret", async |session| {
///     Ok(session.internet_traffic().await?.report())
/// })
/// .await?;
/// ```
pub async fn with_session<T, F>(settings: &Settings, username: &str, password: &str, f: F) -> Result<T>
where
    F: AsyncFnOnce(&mut Session) -> Result<T>,
{
    let mut session = Session::connect(settings, username, password).await?;
    let result = f(&mut session).await;
    session.disconnect().await;
    result
}

/// Parse the base URL, making sure relative pages resolve under it.
fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Send the request and return the body of an HTTP 200 response.
async fn fetch_page(request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::HttpStatus {
            url: response.url().to_string(),
            status,
        });
    }
    let url = response.url().to_string();
    let body = response.text().await?;
    debug!(%url, %status, bytes = body.len(), "Fetched page");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Page, SubPage};
    use mockito::{Matcher, Mock, Server, ServerGuard};

    const LOGIN_PAGE: &str = r#"
        <html><body>
          <form method="post" action="auth.php">
            <input type="text" name="u_81f2" />
            <input type="password" name="p_9a0c" />
            <input type="submit" value="Login" />
          </form>
        </body></html>
    "#;

    const HOME_PAGE: &str = r#"
        <html><body><h1>Welcome</h1><a href="index.php?logout=1">Logout</a></body></html>
    "#;

    const TRAFFIC_PAGE: &str = r#"
        <html><body>
          <div class="row"><p>Used: <b>84.7</b> Gb</p></div>
          <div class="row"><p>Available: <b>60.3</b> Gb</p></div>
        </body></html>
    "#;

    fn settings_for(server: &ServerGuard) -> Settings {
        Settings {
            base_url: server.url(),
            ..Settings::default()
        }
    }

    async fn mock_login(server: &mut ServerGuard, landing_page: &str) -> (Mock, Mock) {
        let login_page = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(LOGIN_PAGE)
            .create_async()
            .await;
        let auth = server
            .mock("POST", "/auth.php")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("u_81f2".into(), "jdoe".into()),
                Matcher::UrlEncoded("p_9a0c".into(), "hunter2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_header("set-cookie", "PHPSESSID=s3ss10n; Path=/")
            .with_body(landing_page)
            .create_async()
            .await;
        (login_page, auth)
    }

    async fn mock_logout(server: &mut ServerGuard, hits: usize) -> Mock {
        server
            .mock("GET", "/index.php")
            .match_query(Matcher::UrlEncoded("logout".into(), "1".into()))
            .expect(hits)
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .create_async()
            .await
    }

    fn traffic_query() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("content".into(), "internet".into()),
            Matcher::UrlEncoded("sub".into(), "traffic".into()),
            Matcher::UrlEncoded("lang".into(), "eng".into()),
        ])
    }

    #[tokio::test]
    async fn test_connect_query_disconnect() {
        let mut server = Server::new_async().await;
        let (login_page, auth) = mock_login(&mut server, HOME_PAGE).await;
        let traffic = server
            .mock("GET", "/index.php")
            .match_query(traffic_query())
            .match_header("cookie", Matcher::Regex("PHPSESSID=s3ss10n".into()))
            .with_status(200)
            .with_body(TRAFFIC_PAGE)
            .create_async()
            .await;
        let logout = mock_logout(&mut server, 1).await;

        let mut session = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap();
        assert!(session.is_connected());

        let page = session.internet_traffic().await.unwrap();
        assert_eq!(page.available().as_deref(), Some("60.3 Gb"));

        session.disconnect().await;
        assert!(!session.is_connected());
        // second call is a no-op
        session.disconnect().await;

        login_page.assert_async().await;
        auth.assert_async().await;
        traffic.assert_async().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, LOGIN_PAGE).await;

        let err = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadCredentials));
        assert_eq!(err.exit_code(), 6);
    }

    #[tokio::test]
    async fn test_login_page_not_ok() {
        let mut server = Server::new_async().await;
        let _down = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let err = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap_err();
        match &err {
            Error::HttpStatus { url, status } => {
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
                assert!(url.starts_with(&server.url()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_login_page_without_form() {
        let mut server = Server::new_async().await;
        let _maintenance = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body><p>Under maintenance</p></body></html>")
            .create_async()
            .await;

        let err = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoginFormNotFound(_)));
    }

    #[tokio::test]
    async fn test_unexpected_logout() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let _expired = server
            .mock("GET", "/index.php")
            .match_query(traffic_query())
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .create_async()
            .await;
        let logout = mock_logout(&mut server, 0).await;

        let mut session = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap();
        let err = session.internet_traffic().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedLogout));
        assert_eq!(err.exit_code(), 7);
        assert!(!session.is_connected());

        let err = session.internet_traffic().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        session.disconnect().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_content_uses_session_lang() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let invoicing = server
            .mock("GET", "/index.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("content".into(), "facturation".into()),
                Matcher::UrlEncoded("lang".into(), "fra".into()),
            ]))
            .with_status(200)
            .with_body("<html><body><h2>Facturation</h2><p>Solde: 0,00 $</p></body></html>")
            .create_async()
            .await;
        let wireless = server
            .mock("GET", "/index.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("content".into(), "internet".into()),
                Matcher::UrlEncoded("sub".into(), "wireless".into()),
                Matcher::UrlEncoded("lang".into(), "eng".into()),
            ]))
            .with_status(200)
            .with_body("<html><body><h2>Wireless</h2></body></html>")
            .create_async()
            .await;
        let _logout = mock_logout(&mut server, 1).await;

        let settings = Settings {
            lang: Lang::Fra,
            ..settings_for(&server)
        };
        let mut session = Session::connect(&settings, "jdoe", "hunter2").await.unwrap();

        let page = session
            .get_content(&ContentParams::page(Page::Invoicing))
            .await
            .unwrap();
        assert_eq!(page.text(), "Facturation\nSolde: 0,00 $");

        let page = session
            .get_content(&ContentParams::sub_page(SubPage::Wireless).with_lang(Lang::Eng))
            .await
            .unwrap();
        assert_eq!(page.text(), "Wireless");

        session.disconnect().await;
        invoicing.assert_async().await;
        wireless.assert_async().await;
    }

    #[tokio::test]
    async fn test_page_not_ok_keeps_session() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let _broken = server
            .mock("GET", "/index.php")
            .match_query(traffic_query())
            .with_status(500)
            .create_async()
            .await;
        let _logout = mock_logout(&mut server, 1).await;

        let mut session = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap();
        let err = session.internet_traffic().await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { .. }));
        assert!(session.is_connected());
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_password_change_page_keeps_session() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let password_page = server
            .mock("GET", "/index.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("content".into(), "profil".into()),
                Matcher::UrlEncoded("sub".into(), "password".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"<html><body>
                  <a href="index.php?logout=1">Logout</a>
                  <h2>Change password</h2>
                  <form method="post" action="index.php?content=profil&sub=password">
                    <input type="password" name="old_password" />
                    <input type="password" name="new_password" />
                    <input type="password" name="confirm_password" />
                    <input type="submit" value="Save" />
                  </form>
                </body></html>"#,
            )
            .create_async()
            .await;
        let _logout = mock_logout(&mut server, 1).await;

        let mut session = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap();
        let page = session
            .get_content(&ContentParams::sub_page(SubPage::Password))
            .await
            .unwrap();
        assert!(page.text().contains("Change password"));
        assert!(session.is_connected());

        session.disconnect().await;
        password_page.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_logout_still_disconnects() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let logout = server
            .mock("GET", "/index.php")
            .match_query(Matcher::UrlEncoded("logout".into(), "1".into()))
            .with_status(500)
            .create_async()
            .await;

        let mut session = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap();
        session.disconnect().await;

        assert!(!session.is_connected());
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_credentials_post_not_ok() {
        let mut server = Server::new_async().await;
        let _login_page = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .create_async()
            .await;
        let _auth = server
            .mock("POST", "/auth.php")
            .with_status(502)
            .create_async()
            .await;

        let err = Session::connect(&settings_for(&server), "jdoe", "hunter2")
            .await
            .unwrap_err();
        match &err {
            Error::HttpStatus { url, status } => {
                assert_eq!(*status, StatusCode::BAD_GATEWAY);
                assert!(url.ends_with("/auth.php"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_with_session_disconnects_on_error() {
        let mut server = Server::new_async().await;
        let _mocks = mock_login(&mut server, HOME_PAGE).await;
        let _traffic = server
            .mock("GET", "/index.php")
            .match_query(traffic_query())
            .with_status(200)
            .with_body("<html><body><p>Nothing to see</p></body></html>")
            .create_async()
            .await;
        let logout = mock_logout(&mut server, 1).await;

        let result: Result<String> = with_session(
            &settings_for(&server),
            "jdoe",
            "hunter2",
            async |session| {
                session
                    .internet_traffic()
                    .await?
                    .available()
                    .ok_or_else(|| Error::DataNotFound("Available".into()))
            },
        )
        .await;

        assert!(matches!(result, Err(Error::DataNotFound(_))));
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let settings = Settings {
            base_url: "http://127.0.0.1:1/".to_string(),
            ..Settings::default()
        };
        let err = Session::connect(&settings, "jdoe", "hunter2").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(
            base_url("https://extranet.example.com/portal").unwrap().as_str(),
            "https://extranet.example.com/portal/"
        );
        assert_eq!(
            base_url("https://extranet.derytelecom.ca/").unwrap().as_str(),
            "https://extranet.derytelecom.ca/"
        );
        assert!(matches!(base_url("extranet"), Err(Error::Url(_))));
    }
}
