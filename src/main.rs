mod async_stdin;
mod bridge;
mod channel;
mod cmd;
mod config;
mod dirs;
mod display;
mod endpoint;
mod error;
mod prelude;
mod protocol;
mod server;
mod surface;
mod term;
mod viewport;
mod ws;

fn main() {
    match crate::cmd::parse().and_then(|m| crate::cmd::run(&m)) {
        Ok(_) => {}
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
