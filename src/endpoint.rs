use crate::prelude::*;

pub const SSH_PATH: &str = "/api/v1/ssh/";

const ID_PARAM: &str = "id";
const PTY_WIDTH_PARAM: &str = "ptyWidth";
const PTY_HEIGHT_PARAM: &str = "ptyHeight";

pub const DEFAULT_PTY_SIZE: crate::term::Size =
    crate::term::Size { rows: 40, cols: 120 };

/// Identifies which remote pty to attach to. Issued by whatever set up the
/// session before we connect, we only pass it along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Where the websocket lives. The scheme follows the page the terminal was
/// loaded from: `https` pages talk `wss`, everything else talks `ws`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    secure: bool,
    host: String,
    port: Option<u16>,
}

impl Endpoint {
    pub fn from_origin(origin: &url::Url) -> Result<Self> {
        let secure = match origin.scheme() {
            "https" => true,
            "http" => false,
            scheme => {
                return Err(Error::UnsupportedOrigin {
                    scheme: scheme.to_string(),
                })
            }
        };
        let host = origin.host_str().context(crate::error::MissingHost {
            url: origin.as_str(),
        })?;
        Ok(Self {
            secure,
            host: host.to_string(),
            port: origin.port(),
        })
    }

    #[cfg(test)]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn url(
        &self,
        id: &SessionId,
        size: crate::term::Size,
    ) -> Result<url::Url> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let base = match self.port {
            Some(port) => {
                format!("{}://{}:{}{}", scheme, self.host, port, SSH_PATH)
            }
            None => format!("{}://{}{}", scheme, self.host, SSH_PATH),
        };
        let mut url = url::Url::parse(&base)
            .context(crate::error::ParseUrl { input: base.clone() })?;
        url.query_pairs_mut()
            .append_pair(ID_PARAM, id.as_str())
            .append_pair(PTY_WIDTH_PARAM, &size.cols.to_string())
            .append_pair(PTY_HEIGHT_PARAM, &size.rows.to_string());
        Ok(url)
    }
}

/// What the server learns from the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub id: Option<String>,
    pub size: crate::term::Size,
}

impl Handshake {
    pub fn from_request_path(path: &str) -> Result<Self> {
        let (route, query) = match path.find('?') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => (path, ""),
        };
        // everything under the ssh path is served the same way
        if !route.starts_with(SSH_PATH)
            && route != SSH_PATH.trim_end_matches('/')
        {
            return Err(Error::UnknownPath {
                path: route.to_string(),
            });
        }

        let mut id = None;
        let mut cols = None;
        let mut rows = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                ID_PARAM => id = Some(value.to_string()),
                PTY_WIDTH_PARAM => cols = value.parse::<u16>().ok(),
                PTY_HEIGHT_PARAM => rows = value.parse::<u16>().ok(),
                _ => {}
            }
        }

        // both dimensions or neither
        let size = match (cols, rows) {
            (Some(cols), Some(rows)) => crate::term::Size { rows, cols },
            _ => DEFAULT_PTY_SIZE,
        };
        let size = if size.is_valid() {
            size
        } else {
            DEFAULT_PTY_SIZE
        };

        Ok(Self {
            id: id.filter(|id| !id.is_empty()),
            size,
        })
    }
}
