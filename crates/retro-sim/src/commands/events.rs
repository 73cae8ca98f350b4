use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use retro_gen::{Event, EventIterator, LogRecord};

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Event log to read.
    #[arg(long)]
    pub log: PathBuf,
    /// Walk the log from its last record back to the first one.
    #[arg(long)]
    pub reverse: bool,
    /// Print at most this many records.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print event tags instead of full records.
    #[arg(long)]
    pub tags: bool,
}

pub fn run(args: &EventsArgs) -> Result<(), Box<dyn Error>> {
    let mut iter = EventIterator::<Event>::open(&args.log)?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.reverse {
        let mut last = None;
        while let Some(record) = iter.next_record()? {
            last = Some(record);
        }
        let mut current = last;
        let mut printed = 0;
        while let Some(record) = current {
            if printed == limit {
                break;
            }
            print_record(&mut out, &record, args.tags)?;
            printed += 1;
            current = iter.previous()?;
        }
    } else {
        for record in iter.take(limit) {
            print_record(&mut out, &record?, args.tags)?;
        }
    }
    Ok(())
}

fn print_record(
    out: &mut impl Write,
    record: &LogRecord<Event>,
    tags_only: bool,
) -> Result<(), Box<dyn Error>> {
    if tags_only {
        writeln!(out, "{}", record.payload.tag)?;
    } else {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}
