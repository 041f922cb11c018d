//! `netflow-reader`: streams decoded records out of one or more flow log
//! files written by `netflowd` (§6 CLI (reader)).

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use log::error;
use structopt::StructOpt;

use netflowd::store::{self, Header};

#[derive(Debug, StructOpt)]
#[structopt(name = "netflow-reader", about = "dumps a netflowd flow log")]
struct Opts {
    /// Print every present field instead of the brief summary line
    #[structopt(short = "v")]
    verbose: bool,

    /// Render timestamps in UTC instead of local time
    #[structopt(short = "U")]
    utc: bool,

    /// One or more flow log files to read
    #[structopt(name = "LOGFILE", required = true)]
    logfiles: Vec<PathBuf>,
}

fn main() {
    netflowd::logger::init(log::LevelFilter::Info, false);

    let opts = Opts::from_args();
    let mut exit_code = 0;

    for path in &opts.logfiles {
        if let Err(e) = dump_file(path, &opts) {
            error!("{}: {}", path.display(), e);
            exit_code = 1;
        }
    }

    std::process::exit(exit_code);
}

fn dump_file(path: &PathBuf, opts: &Opts) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = Header::read(&mut reader)?;
    println!(
        "# {}: version={} start_time={}",
        path.display(),
        header.version,
        format_time(header.start_time as i64, opts.utc)
    );

    loop {
        match store::get_flow(&mut reader)? {
            None => break,
            Some(flow) => {
                if opts.verbose {
                    println!("---");
                    for line in store::verbose_lines(&flow) {
                        println!("{}", line);
                    }
                } else {
                    println!("{}", store::brief_line(&flow));
                }
            }
        }
    }

    Ok(())
}

fn format_time(secs: i64, utc: bool) -> String {
    let dt = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    if utc {
        dt.to_rfc3339()
    } else {
        dt.with_timezone(&chrono::Local).to_rfc3339()
    }
}
