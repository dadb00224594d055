//! ERPNext REST client.
//!
//! Authenticates once (session login or API token), then exposes the
//! resource operations the migration and reset paths need. HTTP failures are
//! translated into [`RequestError`]; response bodies never end up in an error.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{AuthMethod, Config};
use crate::error::{ApiError, MigrateError, RequestError, Result};
use crate::http::{HttpRequest, Method, RawResponse, ReqwestTransport, RetryPolicy, RetryingTransport, Transport};
use crate::record::Document;
use crate::store::{CreatedDocument, DocumentStore, Lookup};

/// Marker the login endpoint puts in a successful response body.
const LOGIN_SUCCESS_MARKER: &str = "Logged In";

/// Name of the session cookie issued by the login endpoint.
const SESSION_COOKIE: &str = "sid";

/// docstatus of a cancelled document.
const CANCELLED: i64 = 2;

/// Client used by the CLI: network transport with retries.
pub type HttpClient = ErpNextClient<RetryingTransport<ReqwestTransport>>;

/// Credential attached to every request after authentication.
#[derive(Clone)]
enum Credential {
    Token(String),
    Session(String),
}

/// `{"data": ...}` envelope used by every resource endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// ERPNext API client over any [`Transport`].
pub struct ErpNextClient<T> {
    transport: T,
    base_url: Url,
    credential: Option<Credential>,
}

impl HttpClient {
    /// Build the network client from configuration and authenticate.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = RetryingTransport::new(
            ReqwestTransport::new(config.migration.request_timeout())?,
            RetryPolicy::from_config(&config.migration),
        );
        let mut client = ErpNextClient::new(transport, &config.erpnext.url)?;
        match config.erpnext.auth_method() {
            Some(AuthMethod::Token { key, secret }) => client.connect_with_token(key, secret).await?,
            Some(AuthMethod::Password { username, password }) => {
                client.authenticate(username, password).await?
            }
            None => {
                return Err(MigrateError::config(
                    "no ERPNext credentials configured",
                ))
            }
        }
        Ok(client)
    }
}

impl<T: Transport> ErpNextClient<T> {
    /// Create an unauthenticated client.
    pub fn new(transport: T, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| MigrateError::Config(format!("invalid ERPNext URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MigrateError::config("invalid ERPNext URL: not a base URL"));
        }
        Ok(Self {
            transport,
            base_url,
            credential: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Log in with username/password and keep the session cookie.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let request = HttpRequest::new(Method::Post, self.url(&["api", "method", "login"]))
            .header("Accept", "application/json")
            .form(vec![
                ("usr".to_string(), username.to_string()),
                ("pwd".to_string(), password.to_string()),
            ]);
        let response = self.transport.send(request).await.map_err(RequestError::from)?;

        if response.status != 200 {
            return Err(MigrateError::Auth(format!(
                "login returned status {}",
                response.status
            )));
        }
        if !response.body.contains(LOGIN_SUCCESS_MARKER) {
            return Err(MigrateError::Auth("invalid credentials".into()));
        }
        let sid = session_cookie(&response)
            .ok_or_else(|| MigrateError::Auth("login response carried no session cookie".into()))?;

        self.credential = Some(Credential::Session(sid));
        info!("Logged in to ERPNext at {}", self.base_url);
        Ok(())
    }

    /// Use a static API key pair and verify it against the server.
    pub async fn connect_with_token(&mut self, key: &str, secret: &str) -> Result<()> {
        self.credential = Some(Credential::Token(format!("token {}:{}", key, secret)));

        let url = self.url(&["api", "method", "frappe.auth.get_logged_user"]);
        let response = self
            .transport
            .send(self.request(Method::Get, url))
            .await
            .map_err(RequestError::from)?;
        if response.status != 200 {
            self.credential = None;
            return Err(MigrateError::Auth(format!(
                "API token rejected with status {}",
                response.status
            )));
        }

        let user = response
            .json::<Value>()
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "unknown user".to_string());
        info!("Connected to ERPNext at {} as {}", self.base_url, user);
        Ok(())
    }

    /// Fetch a document by name. `Ok(None)` on 404.
    pub async fn get(&self, doctype: &str, name: &str) -> std::result::Result<Option<Value>, RequestError> {
        let url = self.resource_url(doctype, Some(name));
        let response = self.transport.send(self.request(Method::Get, url)).await?;
        match response.status {
            200 => Ok(Some(response.json::<Envelope<Value>>()?.data)),
            404 => Ok(None),
            status => Err(ApiError::HttpStatus(status).into()),
        }
    }

    /// Delete a document by name.
    pub async fn delete(&self, doctype: &str, name: &str) -> std::result::Result<(), RequestError> {
        let url = self.resource_url(doctype, Some(name));
        let response = self.transport.send(self.request(Method::Delete, url)).await?;
        match response.status {
            200 | 202 => Ok(()),
            status => Err(ApiError::HttpStatus(status).into()),
        }
    }

    /// Cancel a submitted document.
    pub async fn cancel(&self, doctype: &str, name: &str) -> std::result::Result<(), RequestError> {
        let url = self.url(&["api", "method", "frappe.client.cancel"]);
        let request = self
            .request(Method::Post, url)
            .json(json!({ "doctype": doctype, "name": name }));
        let response = self.transport.send(request).await?;
        match response.status {
            200 | 201 => Ok(()),
            status => Err(ApiError::HttpStatus(status).into()),
        }
    }

    /// Fetch every document of a doctype.
    ///
    /// `page_size == 0` asks the server for everything in one response;
    /// otherwise pages are requested until a short page comes back.
    pub async fn list_all(
        &self,
        doctype: &str,
        fields: &[&str],
        page_size: usize,
    ) -> std::result::Result<Vec<Value>, RequestError> {
        let fields_param = serde_json::to_string(fields).unwrap_or_else(|_| "[\"name\"]".into());
        let mut documents = Vec::new();
        let mut offset = 0;

        loop {
            let mut url = self.resource_url(doctype, None);
            url.query_pairs_mut()
                .append_pair("fields", &fields_param)
                .append_pair("limit_page_length", &page_size.to_string())
                .append_pair("limit_start", &offset.to_string());

            let response = self.transport.send(self.request(Method::Get, url)).await?;
            if response.status != 200 {
                return Err(ApiError::HttpStatus(response.status).into());
            }
            let page = response.json::<Envelope<Vec<Value>>>()?.data;
            let fetched = page.len();
            documents.extend(page);

            if page_size == 0 || fetched < page_size {
                break;
            }
            offset += fetched;
        }

        debug!("Listed {} {} documents", documents.len(), doctype);
        Ok(documents)
    }

    async fn write(
        &self,
        method: Method,
        url: Url,
        document: &Document,
    ) -> std::result::Result<CreatedDocument, RequestError> {
        let request = self
            .request(method, url)
            .header("Content-Type", "application/json")
            .json(Value::Object(document.clone()));
        let response = self.transport.send(request).await?;
        if !matches!(response.status, 200 | 201) {
            return Err(ApiError::HttpStatus(response.status).into());
        }

        let data = response.json::<Envelope<Value>>()?.data;
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or(ApiError::MissingIdentity)?
            .to_string();
        Ok(CreatedDocument { name, data })
    }

    /// Name of the first document matching `filters`, if any.
    async fn find_by_filters(
        &self,
        doctype: &str,
        filters: Value,
    ) -> std::result::Result<Option<String>, RequestError> {
        let mut url = self.resource_url(doctype, None);
        url.query_pairs_mut()
            .append_pair("filters", &filters.to_string())
            .append_pair("fields", "[\"name\"]")
            .append_pair("limit_page_length", "1");
        let response = self.transport.send(self.request(Method::Get, url)).await?;
        if response.status != 200 {
            return Ok(None);
        }
        let Ok(listing) = response.json::<Envelope<Vec<Value>>>() else {
            return Ok(None);
        };
        Ok(listing
            .data
            .first()
            .and_then(|row| row.get("name").and_then(Value::as_str))
            .map(str::to_string))
    }

    fn request(&self, method: Method, url: Url) -> HttpRequest {
        let request = HttpRequest::new(method, url).header("Accept", "application/json");
        match &self.credential {
            Some(Credential::Token(token)) => request.header("Authorization", token.clone()),
            Some(Credential::Session(sid)) => {
                request.header("Cookie", format!("{}={}", SESSION_COOKIE, sid))
            }
            None => request,
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn resource_url(&self, doctype: &str, name: Option<&str>) -> Url {
        match name {
            Some(name) => self.url(&["api", "resource", doctype, name]),
            None => self.url(&["api", "resource", doctype]),
        }
    }
}

#[async_trait]
impl<T: Transport> DocumentStore for ErpNextClient<T> {
    async fn lookup(&self, doctype: &str, lookup: &Lookup) -> std::result::Result<Option<String>, RequestError> {
        match lookup {
            Lookup::Name(name) => {
                let url = self.resource_url(doctype, Some(name));
                let response = self.transport.send(self.request(Method::Get, url)).await?;
                if response.status != 200 {
                    return Ok(None);
                }
                // A 200 without a readable document is not proof of existence.
                Ok(response
                    .json::<Envelope<Value>>()
                    .ok()
                    .and_then(|e| e.data.get("name").and_then(Value::as_str).map(str::to_string))
                    .filter(|n| !n.is_empty()))
            }
            Lookup::Field { field, value } => {
                let filters = json!([[field, "=", value]]);
                self.find_by_filters(doctype, filters).await
            }
            Lookup::Active { field, value } => {
                let filters = json!([[field, "=", value], ["docstatus", "!=", CANCELLED]]);
                self.find_by_filters(doctype, filters).await
            }
        }
    }

    async fn create(&self, doctype: &str, document: &Document) -> std::result::Result<CreatedDocument, RequestError> {
        let url = self.resource_url(doctype, None);
        self.write(Method::Post, url, document).await
    }

    async fn update(
        &self,
        doctype: &str,
        name: &str,
        document: &Document,
    ) -> std::result::Result<CreatedDocument, RequestError> {
        let url = self.resource_url(doctype, Some(name));
        self.write(Method::Put, url, document).await
    }
}

/// Extract the session id from `Set-Cookie` headers.
fn session_cookie(response: &RawResponse) -> Option<String> {
    response.header_values("set-cookie").find_map(|cookie| {
        let pair = cookie.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty() && value != "Guest").then(|| value.to_string())
    })
}
