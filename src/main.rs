use std::path::PathBuf;

use log::{error, info, LevelFilter};
use structopt::StructOpt;
use tokio::sync::mpsc;

use netflowd::collector::{Collector, FileLogWriter};
use netflowd::settings::{parse_macro, Config};

#[derive(Debug, StructOpt)]
#[structopt(name = "netflowd", about = "NetFlow/IPFIX collector daemon")]
struct Opts {
    /// Foreground + verbose (debug) logging
    #[structopt(short = "d")]
    debug: bool,

    /// Foreground, normal logging
    #[structopt(short = "g")]
    foreground: bool,

    /// Config file path
    #[structopt(short = "f", long = "config")]
    config: Option<PathBuf>,

    /// Path to the flow log file
    #[structopt(short = "l", long = "logfile", default_value = "flows.log")]
    logfile: PathBuf,

    /// `name=value` macro, forwarded as a config override; repeatable
    #[structopt(short = "D", parse(try_from_str = parse_macro_arg))]
    macros: Vec<(String, String)>,
}

fn parse_macro_arg(s: &str) -> Result<(String, String), String> {
    parse_macro(s).map_err(|e| e.to_string())
}

fn main() {
    let opts = Opts::from_args();

    let level = if opts.debug { LevelFilter::Debug } else { LevelFilter::Info };
    netflowd::logger::init(level, opts.debug);

    match run(opts) {
        Ok(()) => {
            info!("exiting normally");
        }
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(opts.config.as_deref(), &opts.macros)?;
    config.opts.foreground = config.opts.foreground || opts.debug || opts.foreground;
    config.opts.verbose = config.opts.verbose || opts.debug;

    info!("starting collector on {:?}", config.listen_addrs);

    let log = FileLogWriter::open(&opts.logfile, netflowd::time::unix_now())?;
    let config_path = opts.config.clone();
    let macros = opts.macros.clone();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let collector = Collector::bind(config, config_path, macros, Box::new(log)).await?;
        let (_reconfig_tx, reconfig_rx) = mpsc::channel::<Config>(8);
        collector.run(reconfig_rx).await?;
        Ok::<(), std::io::Error>(())
    })?;

    Ok(())
}
