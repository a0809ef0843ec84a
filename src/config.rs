use crate::prelude::*;
use serde::de::Deserialize as _;

const CONFIG_FILENAME: &str = "config.toml";

const ARGS_OPTION: &str = "args";
const CELL_HEIGHT_OPTION: &str = "cell-height";
const CELL_WIDTH_OPTION: &str = "cell-width";
const COMMAND_OPTION: &str = "command";
const HEARTBEAT_OPTION: &str = "heartbeat-secs";
const ID_OPTION: &str = "id";
const LISTEN_ADDRESS_OPTION: &str = "listen-address";
const ORIGIN_OPTION: &str = "origin";

const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8088";
const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8088";
const DEFAULT_HEARTBEAT: std::time::Duration =
    std::time::Duration::from_secs(30);

pub trait Config: std::fmt::Debug {
    fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()>;
    fn run(
        &self,
    ) -> Box<dyn futures::Future<Item = (), Error = Error> + Send>;
}

pub fn config(
    filename: Option<&std::path::Path>,
) -> Result<Option<config::Config>> {
    let config_filename = if let Some(filename) = filename {
        if !filename.exists() {
            return Err(Error::ConfigFileDoesntExist {
                name: filename.to_string_lossy().to_string(),
            });
        }
        Some(filename.to_path_buf())
    } else {
        crate::dirs::Dirs::new()
            .and_then(|dirs| dirs.config_file(CONFIG_FILENAME))
    };
    config_filename
        .map(|config_filename| config_from_filename(&config_filename))
        .transpose()
}

fn config_from_filename(
    filename: &std::path::Path,
) -> Result<config::Config> {
    let mut config = config::Config::default();
    config
        .merge(config::File::from(filename))
        .context(crate::error::ParseConfigFile)?;
    Ok(config)
}

#[derive(serde::Deserialize, Debug)]
pub struct Client {
    #[serde(deserialize_with = "origin", default = "default_origin")]
    pub origin: url::Url,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl Client {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let origin_help = "Origin of the page serving the terminal; https origins connect over wss (defaults to http://127.0.0.1:8088)";
        let id_help = "Id of the remote session to attach to";

        app.arg(
            clap::Arg::with_name(ORIGIN_OPTION)
                .long(ORIGIN_OPTION)
                .takes_value(true)
                .value_name("URL")
                .help(origin_help),
        )
        .arg(
            clap::Arg::with_name(ID_OPTION)
                .long(ID_OPTION)
                .takes_value(true)
                .value_name("SESSION_ID")
                .help(id_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if let Some(origin) = matches.value_of(ORIGIN_OPTION) {
            self.origin = to_origin(origin)?;
        }
        if let Some(id) = matches.value_of(ID_OPTION) {
            self.session_id = Some(id.to_string());
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<crate::endpoint::Endpoint> {
        crate::endpoint::Endpoint::from_origin(&self.origin)
    }

    pub fn session_id(&self) -> Result<crate::endpoint::SessionId> {
        let id = self
            .session_id
            .as_ref()
            .context(crate::error::MissingSessionId)?;
        crate::endpoint::SessionId::new(id)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            session_id: None,
        }
    }
}

fn origin<'a, D>(deserializer: D) -> std::result::Result<url::Url, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    to_origin(&<String>::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
}

fn default_origin() -> url::Url {
    // constant input, can't fail
    url::Url::parse(DEFAULT_ORIGIN).unwrap()
}

fn to_origin(origin: &str) -> Result<url::Url> {
    url::Url::parse(origin).context(crate::error::ParseUrl { input: origin })
}

#[derive(serde::Deserialize, Debug)]
pub struct Viewport {
    #[serde(default = "default_cell_width")]
    pub cell_width: u32,

    #[serde(default = "default_cell_height")]
    pub cell_height: u32,
}

impl Viewport {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let cell_width_help =
            "Width of a character cell in pixels (defaults to 9)";
        let cell_height_help =
            "Height of a character cell in pixels (defaults to 18)";

        app.arg(
            clap::Arg::with_name(CELL_WIDTH_OPTION)
                .long(CELL_WIDTH_OPTION)
                .takes_value(true)
                .value_name("PIXELS")
                .help(cell_width_help),
        )
        .arg(
            clap::Arg::with_name(CELL_HEIGHT_OPTION)
                .long(CELL_HEIGHT_OPTION)
                .takes_value(true)
                .value_name("PIXELS")
                .help(cell_height_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if let Some(s) = matches.value_of(CELL_WIDTH_OPTION) {
            self.cell_width = s.parse().context(crate::error::ParseInt {
                name: CELL_WIDTH_OPTION,
                input: s,
            })?;
        }
        if let Some(s) = matches.value_of(CELL_HEIGHT_OPTION) {
            self.cell_height = s.parse().context(crate::error::ParseInt {
                name: CELL_HEIGHT_OPTION,
                input: s,
            })?;
        }
        Ok(())
    }

    pub fn cell(&self) -> Result<crate::viewport::CellSize> {
        crate::viewport::CellSize::new(self.cell_width, self.cell_height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
        }
    }
}

fn default_cell_width() -> u32 {
    crate::viewport::DEFAULT_CELL_WIDTH
}

fn default_cell_height() -> u32 {
    crate::viewport::DEFAULT_CELL_HEIGHT
}

#[derive(serde::Deserialize, Debug)]
pub struct Server {
    #[serde(
        deserialize_with = "listen_address",
        default = "default_listen_address"
    )]
    pub listen_address: std::net::SocketAddr,

    #[serde(
        rename = "heartbeat_secs",
        deserialize_with = "heartbeat",
        default = "default_heartbeat"
    )]
    pub heartbeat: std::time::Duration,
}

impl Server {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let listen_address_help =
            "Host and port to listen on (defaults to localhost:8088)";
        let heartbeat_help =
            "Number of seconds between websocket pings (defaults to 30)";

        app.arg(
            clap::Arg::with_name(LISTEN_ADDRESS_OPTION)
                .long(LISTEN_ADDRESS_OPTION)
                .takes_value(true)
                .value_name("HOST:PORT")
                .help(listen_address_help),
        )
        .arg(
            clap::Arg::with_name(HEARTBEAT_OPTION)
                .long(HEARTBEAT_OPTION)
                .takes_value(true)
                .value_name("SECS")
                .help(heartbeat_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if let Some(address) = matches.value_of(LISTEN_ADDRESS_OPTION) {
            self.listen_address = to_listen_address(address)?;
        }
        if let Some(s) = matches.value_of(HEARTBEAT_OPTION) {
            let secs = s.parse().context(crate::error::ParseInt {
                name: HEARTBEAT_OPTION,
                input: s,
            })?;
            self.heartbeat = to_heartbeat(secs)?;
        }
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            heartbeat: default_heartbeat(),
        }
    }
}

fn listen_address<'a, D>(
    deserializer: D,
) -> std::result::Result<std::net::SocketAddr, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    to_listen_address(&<String>::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
}

fn default_listen_address() -> std::net::SocketAddr {
    // constant input, can't fail
    to_listen_address(DEFAULT_LISTEN_ADDRESS).unwrap()
}

fn to_listen_address(address: &str) -> Result<std::net::SocketAddr> {
    address.parse().context(crate::error::ParseAddr)
}

fn heartbeat<'a, D>(
    deserializer: D,
) -> std::result::Result<std::time::Duration, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    to_heartbeat(u64::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
}

fn default_heartbeat() -> std::time::Duration {
    DEFAULT_HEARTBEAT
}

fn to_heartbeat(secs: u64) -> Result<std::time::Duration> {
    if secs == 0 {
        return Err(Error::InvalidHeartbeat);
    }
    Ok(std::time::Duration::from_secs(secs))
}

#[derive(serde::Deserialize, Debug)]
pub struct Command {
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Command {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let command_help = "Command to run for each session";
        let args_help = "Arguments for the command";

        app.arg(
            clap::Arg::with_name(COMMAND_OPTION)
                .index(1)
                .help(command_help),
        )
        .arg(
            clap::Arg::with_name(ARGS_OPTION)
                .index(2)
                .multiple(true)
                .help(args_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if let Some(command) = matches.value_of(COMMAND_OPTION) {
            self.command = command.to_string();
        }
        if let Some(args) = matches.values_of(ARGS_OPTION) {
            self.args = args.map(std::string::ToString::to_string).collect();
        }
        Ok(())
    }
}

impl Default for Command {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
        }
    }
}

fn default_command() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

fn default_args() -> Vec<String> {
    vec![]
}
