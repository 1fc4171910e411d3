//! Login state machine
//!
//! ```text
//! FetchForm -> ExtractTokens -> Submit -> Verify -> Success | Failure
//! ```
//!
//! Two flavors share the machine: the WordPress core login page and the
//! WooCommerce "my account" form. Verification is strict: the response must
//! carry the expected status, show no login form, and display the generated
//! username. Any failing condition bumps `loginFailureCounter` and aborts the
//! iteration.

use std::fmt;
use std::sync::LazyLock;

use rand::Rng;
use scraper::{Html, Selector};
use tracing::{debug, trace};

use super::assets::selector;
use super::checks::CheckKind;
use super::http::{Exchange, RequestParams};
use super::vu::VirtualUser;
use crate::errors::{IterationError, IterationResult};
use crate::utils::resolve;

static PASSWORD_INPUT: LazyLock<Selector> = LazyLock::new(|| selector("input[type=password]"));
static WP_REDIRECT_TO: LazyLock<Selector> = LazyLock::new(|| selector("input[name=redirect_to]"));
static WP_TESTCOOKIE: LazyLock<Selector> = LazyLock::new(|| selector("input[name=testcookie]"));
static WOO_FORM: LazyLock<Selector> = LazyLock::new(|| selector("form.woocommerce-form-login"));
static HIDDEN_INPUTS: LazyLock<Selector> = LazyLock::new(|| selector("input[type=hidden]"));
static IDENTITY: LazyLock<Selector> = LazyLock::new(|| selector(".display-name, .username"));
static WOO_IDENTITY: LazyLock<Selector> =
    LazyLock::new(|| selector(".woocommerce-MyAccount-content strong"));

/// WooCommerce account page, relative to the site root
pub const WOO_ACCOUNT_PATH: &str = "my-account/";

/// Which login form to drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFlavor {
    /// WordPress core login (`wp-login.php` by default)
    WordPress { login_path: String },
    /// WooCommerce `my-account/` login form
    WooCommerce,
}

impl LoginFlavor {
    pub fn login_path(&self) -> &str {
        match self {
            Self::WordPress { login_path } => login_path,
            Self::WooCommerce => WOO_ACCOUNT_PATH,
        }
    }

    fn not_login_check(&self) -> CheckKind {
        match self {
            Self::WordPress { .. } => CheckKind::WpPageIsNotLogin,
            Self::WooCommerce => CheckKind::WooPageIsNotLogin,
        }
    }
}

/// Login credentials with a randomised username suffix
#[derive(Clone)]
pub struct Credentials {
    pub username_base: String,
    pub range_start: u32,
    pub range_end: u32,
    pub password: String,
}

impl Drop for Credentials {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.password.zeroize();
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username_base", &self.username_base)
            .field("range_start", &self.range_start)
            .field("range_end", &self.range_end)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// `username_base` followed by a uniform random integer in `[range_start, range_end]`
    pub fn generate_username(&self) -> String {
        let (lo, hi) = if self.range_start <= self.range_end {
            (self.range_start, self.range_end)
        } else {
            (self.range_end, self.range_start)
        };
        let n = rand::rng().random_range(lo..=hi);
        format!("{}{n}", self.username_base)
    }
}

/// Where the machine is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    FetchForm,
    ExtractTokens,
    Submit,
    Verify,
    Success,
    Failure,
}

/// Hidden-field tokens pulled from the login form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginTokens {
    /// Where the form posts to
    pub action: String,
    /// Hidden fields, in form order; missing values are empty strings
    pub fields: Vec<(String, String)>,
}

/// Read the submit target and hidden tokens from a login page
///
/// Missing fields are not an error: WordPress tokens default to empty
/// strings and a WooCommerce form without hidden inputs submits none.
pub fn extract_tokens(page: &Exchange, flavor: &LoginFlavor) -> LoginTokens {
    let doc = Html::parse_document(&page.body);
    let first_value = |sel: &Selector| {
        doc.select(sel)
            .next()
            .and_then(|el| el.value().attr("value"))
            .unwrap_or_default()
            .to_string()
    };

    match flavor {
        LoginFlavor::WordPress { .. } => LoginTokens {
            action: page.url.clone(),
            fields: vec![
                ("redirect_to".to_string(), first_value(&WP_REDIRECT_TO)),
                ("testcookie".to_string(), first_value(&WP_TESTCOOKIE)),
            ],
        },
        LoginFlavor::WooCommerce => {
            let Some(form) = doc.select(&WOO_FORM).next() else {
                return LoginTokens {
                    action: page.url.clone(),
                    fields: Vec::new(),
                };
            };
            let action = form
                .value()
                .attr("action")
                .and_then(|href| url::Url::parse(&page.url).ok().and_then(|base| resolve(&base, href)))
                .unwrap_or_else(|| page.url.clone());
            let fields = form
                .select(&HIDDEN_INPUTS)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    let value = input.value().attr("value").unwrap_or_default();
                    Some((name.to_string(), value.to_string()))
                })
                .collect();
            LoginTokens { action, fields }
        }
    }
}

/// Form body for the login POST
pub fn login_form(
    flavor: &LoginFlavor,
    username: &str,
    password: &str,
    tokens: &LoginTokens,
) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = match flavor {
        LoginFlavor::WordPress { .. } => vec![
            ("log".into(), username.into()),
            ("pwd".into(), password.into()),
            ("rememberme".into(), "forever".into()),
            ("wp-submit".into(), "Log In".into()),
        ],
        LoginFlavor::WooCommerce => vec![
            ("username".into(), username.into()),
            ("password".into(), password.into()),
            ("rememberme".into(), "forever".into()),
            ("login".into(), "Log in".into()),
        ],
    };
    form.extend(tokens.fields.iter().cloned());
    form
}

/// Decide whether a login response shows a logged-in `username`
///
/// Passes only when the status matches, no login-form marker remains, and
/// some identity element's trimmed text equals `username`.
pub fn verify_login(
    response: &Exchange,
    expected_status: u16,
    username: &str,
    flavor: &LoginFlavor,
) -> Result<(), String> {
    if response.status != expected_status {
        return Err(format!(
            "status code was *not* {expected_status} (got {})",
            response.status
        ));
    }

    let doc = Html::parse_document(&response.body);
    if !flavor.not_login_check().passes(response) || doc.select(&PASSWORD_INPUT).next().is_some() {
        return Err("page *has* login form".to_string());
    }

    let shown = |sel: &Selector| {
        doc.select(sel)
            .any(|el| el.text().collect::<String>().trim() == username)
    };
    let identified = match flavor {
        LoginFlavor::WordPress { .. } => shown(&IDENTITY),
        LoginFlavor::WooCommerce => shown(&IDENTITY) || shown(&WOO_IDENTITY),
    };
    if !identified {
        return Err(format!("displayed identity is not {username}"));
    }

    Ok(())
}

/// One login attempt for one VU
#[derive(Debug)]
pub struct LoginFlow<'a> {
    flavor: LoginFlavor,
    credentials: &'a Credentials,
    expected_status: u16,
    state: LoginState,
}

impl<'a> LoginFlow<'a> {
    pub fn new(flavor: LoginFlavor, credentials: &'a Credentials) -> Self {
        Self {
            flavor,
            credentials,
            expected_status: 200,
            state: LoginState::FetchForm,
        }
    }

    /// Status the submit response must carry (200 after redirects by default)
    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn enter(&mut self, next: LoginState) {
        trace!(from = ?self.state, to = ?next, "login transition");
        self.state = next;
    }

    /// Drive the machine to completion, returning the logged-in username
    pub async fn run(&mut self, vu: &mut VirtualUser) -> IterationResult<String> {
        let result = self.attempt(vu).await;
        self.enter(if result.is_ok() {
            LoginState::Success
        } else {
            LoginState::Failure
        });
        result
    }

    async fn attempt(&mut self, vu: &mut VirtualUser) -> IterationResult<String> {
        // FetchForm: status and assets are handled like any other page
        self.enter(LoginState::FetchForm);
        let login_url = vu.site().settings.url(self.flavor.login_path());
        let form_page = vu.get_page(&login_url).await?;
        vu.pause().await;

        self.enter(LoginState::ExtractTokens);
        let tokens = extract_tokens(&form_page, &self.flavor);

        self.enter(LoginState::Submit);
        let username = self.credentials.generate_username();
        debug!(vu = vu.id(), username = %username, "Logging in");
        let fields = login_form(
            &self.flavor,
            &username,
            &self.credentials.password,
            &tokens,
        );
        let form: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let params = RequestParams::form().with_referer(login_url.as_str());
        let response = vu.post_form(&tokens.action, &form, &params).await?;

        self.enter(LoginState::Verify);
        if let Err(reason) = verify_login(&response, self.expected_status, &username, &self.flavor) {
            let metrics = vu.metrics();
            metrics.record_login_failure();
            if response.status != self.expected_status {
                return Err(metrics.record_error(IterationError::UnexpectedStatus {
                    url: response.url.clone(),
                    expected: self.expected_status,
                    actual: response.status,
                }));
            }
            return Err(IterationError::LoginFailed { username, reason });
        }

        vu.metrics().record(&response);
        vu.metrics().record_login_time(&response);
        vu.get_page_assets(&response).await?;

        Ok(username)
    }
}
