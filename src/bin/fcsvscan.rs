use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use anyhow::{Result, bail};
use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use csvscan_rs::common::io::open_noatime;
use csvscan_rs::common::io_error_msg;
use csvscan_rs::csv::{CsvReader, DEFAULT_MAX_FIELDS};
use csvscan_rs::cursor::{BufferedCursor, Cursor, DEFAULT_CAPACITY, MappedCursor};
use csvscan_rs::error::{CsvError, MalformedReason};

const TOOL_NAME: &str = "fcsvscan";

#[derive(Parser)]
#[command(
    name = "fcsvscan",
    version,
    about = "Tokenize CSV files and print row counts, a column, or a column sum"
)]
struct Cli {
    /// Read files through a fixed-size buffer instead of mapping them
    #[arg(long)]
    buffered: bool,

    /// Buffer capacity for standard input and --buffered; bounds the longest row
    #[arg(long = "buffer-size", value_name = "BYTES", default_value_t = DEFAULT_CAPACITY)]
    buffer_size: usize,

    /// Report rows with more than N fields and skip them
    #[arg(long = "max-fields", value_name = "N", default_value_t = DEFAULT_MAX_FIELDS)]
    max_fields: usize,

    /// Print the value of the column whose header is NAME for every data row
    #[arg(short = 'c', long = "column", value_name = "NAME")]
    column: Option<String>,

    /// With --column, print the numeric sum of the column instead
    #[arg(short = 's', long = "sum", requires = "column")]
    sum: bool,

    /// Log refills and row errors to standard error
    #[arg(long)]
    trace: bool,

    /// Files to scan ("-" for standard input)
    files: Vec<String>,
}

#[derive(Clone, Copy)]
enum Mode<'a> {
    Stats,
    Column(&'a str),
    Sum(&'a str),
}

#[derive(Default)]
struct Report {
    rows: u64,
    widest: usize,
    /// Column values, newline terminated.
    values: Vec<u8>,
    sum: f64,
    /// Row errors, formatted for stderr.
    warnings: Vec<String>,
    /// Input was abandoned before its end.
    truncated: bool,
}

fn scan<C: Cursor>(cursor: C, name: &str, cli: &Cli, mode: Mode<'_>) -> Result<Report> {
    let span = if cli.trace {
        tracing::info_span!("input", file = %name)
    } else {
        tracing::Span::none()
    };
    let mut reader = CsvReader::new(cursor)
        .with_max_fields(cli.max_fields)
        .with_span(span);

    let mut report = Report::default();
    let mut column: Option<usize> = None;
    loop {
        let row = match reader.read_row() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) if e.is_fatal() => {
                // main prints only this outermost message
                let msg = format!("{name}: {e}");
                return Err(anyhow::Error::new(e).context(msg));
            }
            Err(
                e @ CsvError::Malformed {
                    reason: MalformedReason::RowExceedsBuffer { .. },
                    ..
                },
            ) => {
                // the reader cannot move past this row
                report.warnings.push(e.to_string());
                report.truncated = true;
                break;
            }
            Err(e) => {
                report.warnings.push(e.to_string());
                continue;
            }
        };

        report.rows += 1;
        report.widest = report.widest.max(row.count());

        let (Mode::Column(header) | Mode::Sum(header)) = mode else {
            continue;
        };
        let Some(index) = column else {
            match row.position_by_text(header) {
                Some(i) => column = Some(i),
                None => bail!("{name}: column '{header}' not found"),
            }
            continue;
        };
        let cell = row.get(index);
        match mode {
            Mode::Sum(_) => report.sum += cell.map_or(0.0, |c| c.as_number()),
            _ => {
                if let Some(cell) = cell {
                    report.values.extend_from_slice(cell.as_bytes());
                }
                report.values.push(b'\n');
            }
        }
    }
    Ok(report)
}

fn process(name: &str, cli: &Cli, mode: Mode<'_>) -> Result<Report> {
    if name == "-" {
        let cursor = BufferedCursor::with_capacity(io::stdin().lock(), cli.buffer_size);
        return scan(cursor, name, cli, mode);
    }
    if cli.buffered {
        let path = Path::new(name);
        let file = open_noatime(path).map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        scan(
            BufferedCursor::with_capacity(file, cli.buffer_size),
            name,
            cli,
            mode,
        )
    } else {
        scan(MappedCursor::open(name)?, name, cli, mode)
    }
}

fn write_report(
    out: &mut impl Write,
    report: &Report,
    name: Option<&str>,
    mode: Mode<'_>,
) -> io::Result<()> {
    match mode {
        Mode::Stats => {
            let mut num = itoa::Buffer::new();
            out.write_all(num.format(report.rows).as_bytes())?;
            out.write_all(b" ")?;
            out.write_all(num.format(report.widest).as_bytes())?;
        }
        Mode::Column(_) => return out.write_all(&report.values),
        Mode::Sum(_) => write!(out, "{}", report.sum)?,
    }
    if let Some(name) = name {
        out.write_all(b" ")?;
        out.write_all(name.as_bytes())?;
    }
    out.write_all(b"\n")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fcsvscan=trace,csvscan_rs=trace"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    csvscan_rs::common::reset_sigpipe();

    let cli = Cli::parse();
    if cli.trace {
        init_tracing();
    }

    let named = !cli.files.is_empty();
    let files: Vec<String> = if named {
        cli.files.clone()
    } else {
        vec!["-".to_string()]
    };
    let mode = match (&cli.column, cli.sum) {
        (Some(column), true) => Mode::Sum(column),
        (Some(column), false) => Mode::Column(column),
        (None, _) => Mode::Stats,
    };

    // one reader per input; results are printed in argument order
    let reports: Vec<Result<Report>> = files
        .par_iter()
        .map(|name| process(name, &cli, mode))
        .collect();

    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(256 * 1024, stdout.lock());
    let mut had_error = false;

    for (name, result) in files.iter().zip(reports) {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{}: {}", TOOL_NAME, e);
                had_error = true;
                continue;
            }
        };
        for warning in &report.warnings {
            eprintln!("{}: {}: {}", TOOL_NAME, name, warning);
        }
        had_error |= report.truncated;

        let label = named.then_some(name.as_str());
        if let Err(e) = write_report(&mut out, &report, label, mode) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                process::exit(0);
            }
            eprintln!("{}: write error: {}", TOOL_NAME, io_error_msg(&e));
            process::exit(1);
        }
    }

    if let Err(e) = out.flush()
        && e.kind() != io::ErrorKind::BrokenPipe
    {
        eprintln!("{}: write error: {}", TOOL_NAME, io_error_msg(&e));
        had_error = true;
    }

    if had_error {
        process::exit(1);
    }
}
