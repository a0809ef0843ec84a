use crate::prelude::*;

mod connect;
mod serve;

struct Command {
    name: &'static str,
    cmd: &'static dyn for<'a, 'b> Fn(clap::App<'a, 'b>) -> clap::App<'a, 'b>,
    config: &'static dyn Fn(
        Option<config::Config>,
    ) -> Result<Box<dyn crate::config::Config>>,
    log_level: &'static str,
}

const COMMANDS: &[Command] = &[
    Command {
        name: "connect",
        cmd: &connect::cmd,
        config: &connect::config,
        // anything printed would land in the middle of the remote screen
        log_level: "error",
    },
    Command {
        name: "serve",
        cmd: &serve::cmd,
        config: &serve::config,
        log_level: "info",
    },
];

pub fn parse<'a>() -> Result<clap::ArgMatches<'a>> {
    let mut app = clap::App::new(program_name()?)
        .about("Attach a terminal to a remote pty over a websocket")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .arg(
            clap::Arg::with_name("config-file")
                .long("config-file")
                .takes_value(true)
                .value_name("FILE")
                .help("Read configuration from FILE"),
        )
        .global_setting(clap::AppSettings::DontCollapseArgsInUsage)
        .global_setting(clap::AppSettings::GlobalVersion)
        .global_setting(clap::AppSettings::UnifiedHelpMessage)
        .global_setting(clap::AppSettings::VersionlessSubcommands)
        .setting(clap::AppSettings::SubcommandRequiredElseHelp);

    for cmd in COMMANDS {
        let subcommand = clap::SubCommand::with_name(cmd.name);
        app = app.subcommand(
            (cmd.cmd)(subcommand).setting(clap::AppSettings::NextLineHelp),
        );
    }

    app.get_matches_safe().context(crate::error::ParseArgs)
}

pub fn run(matches: &clap::ArgMatches<'_>) -> Result<()> {
    let mut chosen_cmd = &COMMANDS[0];
    let mut chosen_submatches = &clap::ArgMatches::<'_>::default();
    for cmd in COMMANDS {
        if let Some(submatches) = matches.subcommand_matches(cmd.name) {
            chosen_cmd = cmd;
            chosen_submatches = submatches;
        }
    }

    env_logger::from_env(
        env_logger::Env::default().default_filter_or(chosen_cmd.log_level),
    )
    .init();

    let config = crate::config::config(
        matches.value_of("config-file").map(std::path::Path::new),
    )?;
    let mut cmd_config = (chosen_cmd.config)(config)?;
    cmd_config.merge_args(chosen_submatches)?;
    log::debug!("{:?}", cmd_config);

    tokio::run(cmd_config.run().map_err(|e| {
        log::error!("{}", e);
    }));

    Ok(())
}

fn program_name() -> Result<String> {
    let program =
        std::env::args().next().context(crate::error::MissingArgv)?;
    let path = std::path::Path::new(&program);
    let filename = path.file_name();
    Ok(filename
        .ok_or_else(|| Error::NotAFileName {
            path: path.to_string_lossy().to_string(),
        })?
        .to_string_lossy()
        .to_string())
}
