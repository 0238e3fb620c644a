use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde_json::json;

use dtvzap_core::error::Error;
use dtvzap_core::last_watched::FileStore;
use dtvzap_core::last_watched::LastWatchedStore;
use dtvzap_core::last_watched::MemoryStore;
use dtvzap_core::middleware::Middleware;
use dtvzap_core::models::*;
use dtvzap_core::router::ChannelRouter;
use dtvzap_core::simulator::SimulatedMiddleware;
use dtvzap_core::tracing_ext;
use dtvzap_core::tracing_ext::init_tracing;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Opt {
    /// Path to a configuration file in a YAML format.
    ///
    /// The DTVZAP_CONFIG environment variable is used if this option is not
    /// specified.
    #[arg(short, long, env = "DTVZAP_CONFIG")]
    config: PathBuf,

    /// Logging format.
    #[arg(long, value_enum, env = "DTVZAP_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl From<LogFormat> for tracing_ext::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => tracing_ext::LogFormat::Text,
            LogFormat::Json => tracing_ext::LogFormat::Json,
        }
    }
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Show the live, record and playback routes found on the front-ends.
    Routes,

    /// List the channel names.
    List,

    /// Show the channel on air, or the last watched one.
    Current,

    /// Tune to a channel.
    ///
    /// The number is 0-based and wraps around the channel list in both
    /// directions.
    Zap {
        #[arg(allow_negative_numbers = true)]
        number: i64,
    },

    /// Tune to the next channel.
    Up,

    /// Tune to the previous channel.
    Down,

    /// Show a channel.
    Info {
        /// 0-based channel number.
        number: usize,

        /// Include the present and following events.
        #[arg(long)]
        status: bool,
    },

    /// Show the current date and time of the middleware.
    Time,
}

fn main() -> Result<(), Error> {
    let opt = Opt::parse();

    init_tracing(opt.log_format.into());

    let config = dtvzap_core::config::load(&opt.config);

    let middleware = SimulatedMiddleware::new(&config.simulator)?;
    let store: Box<dyn LastWatchedStore> = match config.last_watched.file {
        Some(ref path) => Box::new(FileStore::open(path.clone())?),
        None => Box::new(MemoryStore::default()),
    };
    let mut router = ChannelRouter::new(middleware, config.ip_channels.clone(), store)?;

    let result = run(&mut router, &opt.command);
    if let Err(ref err) = result {
        tracing::error!(%err, "Command failed");
    }

    router.stop()?;
    result
}

fn run<M, S>(router: &mut ChannelRouter<M, S>, command: &Command) -> Result<(), Error>
where
    M: Middleware,
    S: LastWatchedStore,
{
    let output = match *command {
        Command::Routes => {
            let routes = router.routes();
            let mut value = json!({
                "playback": routes.playback_route().map(|route| route.value()),
                "hasDummyEntry": routes.has_dummy_entry(),
            });
            for source_type in [
                SourceType::Sat,
                SourceType::Cab,
                SourceType::Ter,
                SourceType::Ip,
            ] {
                value[source_type.to_string()] = json!({
                    "live": routes.live_route(source_type).map(|route| route.value()),
                    "record": routes.record_route(source_type).map(|route| route.value()),
                });
            }
            value
        }
        Command::List => {
            let channels: Vec<_> = router
                .channel_names()?
                .into_iter()
                .enumerate()
                .map(|(i, name)| json!({ "number": i + 1, "name": name }))
                .collect();
            json!(channels)
        }
        Command::Current => {
            router.register_epg_callback()?;
            let (resolved, index) = match router.current_channel_number()? {
                CurrentChannel::Index(index) => (true, index),
                CurrentChannel::Unresolved => (false, router.last_watched()),
            };
            let info = router.channel_info(index, ChannelInfoMode::Status)?;
            json!({ "resolved": resolved, "channel": info })
        }
        Command::Zap { number } => json!(router.change_channel_by_number(number)?),
        Command::Up => json!(router.change_channel_up()?),
        Command::Down => json!(router.change_channel_down()?),
        Command::Info { number, status } => {
            let mode = if status {
                router.register_epg_callback()?;
                ChannelInfoMode::Status
            } else {
                ChannelInfoMode::Change
            };
            json!(router.channel_info(number, mode)?)
        }
        Command::Time => json!(router.current_time()?.to_rfc3339()),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(args: &[&str]) -> Result<Opt, clap::Error> {
        Opt::try_parse_from(
            ["dtvzap", "--config", "/path/to/config.yml"]
                .iter()
                .chain(args.iter()),
        )
    }

    #[test]
    fn test_parse_zap() {
        assert_matches!(parse(&["zap", "3"]), Ok(opt) => {
            assert_eq!(opt.command, Command::Zap { number: 3 });
        });
        assert_matches!(parse(&["zap", "-1"]), Ok(opt) => {
            assert_eq!(opt.command, Command::Zap { number: -1 });
        });
        assert!(parse(&["zap"]).is_err());
        assert!(parse(&["zap", "one"]).is_err());
    }

    #[test]
    fn test_parse_info() {
        assert_matches!(parse(&["info", "2"]), Ok(opt) => {
            assert_eq!(opt.command, Command::Info { number: 2, status: false });
        });
        assert_matches!(parse(&["info", "2", "--status"]), Ok(opt) => {
            assert_eq!(opt.command, Command::Info { number: 2, status: true });
        });
        assert!(parse(&["info", "-1"]).is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_matches!(parse(&["--log-format", "json", "list"]), Ok(opt) => {
            assert_matches!(opt.log_format, LogFormat::Json);
            assert_eq!(
                tracing_ext::LogFormat::from(opt.log_format),
                tracing_ext::LogFormat::Json
            );
            assert_eq!(opt.command, Command::List);
        });
        assert!(parse(&["--log-format", "xml", "list"]).is_err());
    }

    #[test]
    fn test_parse_without_command() {
        assert!(parse(&[]).is_err());
    }
}
