use tokio_tungstenite::tungstenite;

#[derive(Debug, snafu::Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("failed to bind to {}: {}", address, source))]
    Bind {
        address: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[snafu(display("channel is not open (state: {})", state))]
    ChannelNotOpen { state: crate::channel::State },

    #[snafu(display(
        "channel can't be opened again (state: {}), start a new session",
        state
    ))]
    ChannelReused { state: crate::channel::State },

    #[snafu(display("config file {} doesn't exist", name))]
    ConfigFileDoesntExist { name: String },

    #[snafu(display("couldn't parse config: {}", source))]
    CouldntParseConfig { source: config::ConfigError },

    #[snafu(display("display subscription was dropped"))]
    DisplaySubscription,

    #[snafu(display("session id must not be empty"))]
    EmptySessionId,

    #[snafu(display("failed to flush terminal: {}", source))]
    FlushTerminal { source: std::io::Error },

    #[snafu(display("failed to get terminal size: {}", source))]
    GetTerminalSize { source: crossterm::ErrorKind },

    #[snafu(display(
        "invalid cell size {}x{}: both dimensions must be positive",
        width,
        height
    ))]
    InvalidCellSize { width: u32, height: u32 },

    #[snafu(display("heartbeat interval must be at least one second"))]
    InvalidHeartbeat,

    #[snafu(display("received a frame that isn't utf8: {}", source))]
    InvalidFrameEncoding { source: std::string::FromUtf8Error },

    #[snafu(display("malformed message: {}", source))]
    MalformedMessage { source: serde_json::Error },

    #[snafu(display("couldn't find name in argv"))]
    MissingArgv,

    #[snafu(display("origin url {} has no host", url))]
    MissingHost { url: String },

    #[snafu(display("channel opened without an initial size"))]
    MissingViewport,

    #[snafu(display("no session id given (use --id)"))]
    MissingSessionId,

    #[snafu(display(
        "detected argv path was not a valid filename: {}",
        path
    ))]
    NotAFileName { path: String },

    #[snafu(display("failed to parse address: {}", source))]
    ParseAddr { source: std::net::AddrParseError },

    #[snafu(display("{}", source))]
    ParseArgs { source: clap::Error },

    #[snafu(display("failed to parse config file: {}", source))]
    ParseConfigFile { source: config::ConfigError },

    #[snafu(display("failed to parse {} '{}': {}", name, input, source))]
    ParseInt {
        name: &'static str,
        input: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("failed to parse url '{}': {}", input, source))]
    ParseUrl {
        input: String,
        source: url::ParseError,
    },

    #[snafu(display("failed to read from terminal: {}", source))]
    ReadTerminal { source: std::io::Error },

    #[snafu(display("failed to serialize message: {}", source))]
    SerializeMessage { source: serde_json::Error },

    #[snafu(display("SIGWINCH handler failed: {}", source))]
    SigWinchHandler { source: std::io::Error },

    #[snafu(display("failed to accept connection: {}", source))]
    SocketAccept { source: std::io::Error },

    #[snafu(display("pty process failed: {}", source))]
    Subprocess {
        source: tokio_pty_process_stream::Error,
    },

    #[snafu(display("timer failed: {}", source))]
    Timer { source: tokio::timer::Error },

    #[snafu(display("failed to put the terminal into raw mode: {}", source))]
    ToRawMode { source: crossterm::ErrorKind },

    #[snafu(display("failed to accept websocket connection: {}", source))]
    TransportAccept { source: tungstenite::Error },

    #[snafu(display("connection closed before it was opened"))]
    TransportClosed,

    #[snafu(display("failed to connect to {}: {}", url, source))]
    TransportConnect {
        url: String,
        source: tungstenite::Error,
    },

    #[snafu(display("websocket connection failed: {}", source))]
    TransportError { source: tungstenite::Error },

    #[snafu(display("unknown websocket path {}", path))]
    UnknownPath { path: String },

    #[snafu(display(
        "origin scheme must be http or https (got {})",
        scheme
    ))]
    UnsupportedOrigin { scheme: String },

    #[snafu(display("failed to write to terminal: {}", source))]
    WriteTerminal { source: std::io::Error },
}

impl Error {
    // a single bad frame or a send on a channel that isn't open is reported
    // but doesn't end the session
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MalformedMessage { .. }
            | Self::InvalidFrameEncoding { .. }
            | Self::ChannelNotOpen { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
