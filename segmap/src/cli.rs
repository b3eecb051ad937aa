use std::io::Read;

use clap::Parser;
use segmap::lamina::{transform, ByteOrder, Layout};
use serde::Serialize;

#[derive(Clone, Copy, clap::ValueEnum)]
enum Order {
    Little,
    Big,
    Native,
}

impl From<Order> for ByteOrder {
    fn from(order: Order) -> ByteOrder {
        match order {
            Order::Little => ByteOrder::Little,
            Order::Big => ByteOrder::Big,
            Order::Native => ByteOrder::NATIVE,
        }
    }
}

/// Reads a JSON layout on stdin and prints its offsets.
#[derive(Parser)]
struct Args {
    /// Rewrite every value of the layout to this byte order.
    #[clap(long, value_enum)]
    byte_order: Option<Order>,

    /// Write the (possibly rewritten) layout as JSON to this file.
    #[clap(short, long)]
    output: Option<String>,

    /// Print the report as JSON instead of a table.
    #[clap(long)]
    json: bool,

    #[clap(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Row {
    path: String,
    offset: usize,
    size: usize,
    layout: String,
}

#[derive(Serialize)]
struct Report {
    layout: String,
    size: usize,
    alignment: usize,
    fingerprint: String,
    members: Vec<Row>,
}

/// Rows for every node below `layout`; sequences are described through element 0.
fn collect_rows(layout: &Layout, path: &str, offset: usize, rows: &mut Vec<Row>) {
    match layout {
        Layout::Struct(group) | Layout::Union(group) => {
            for (ix, (delta, member)) in group.iter().enumerate() {
                let name = match member.name() {
                    Some(name) => format!("{}.{}", path, name),
                    None => format!("{}.#{}", path, ix),
                };
                push_row(member, &name, offset + delta, rows);
            }
        }
        Layout::Sequence(seq) => {
            push_row(seq.element(), &format!("{}[0]", path), offset, rows);
        }
        Layout::Value(_) | Layout::Padding(_) => {}
    }
}

fn push_row(layout: &Layout, path: &str, offset: usize, rows: &mut Vec<Row>) {
    rows.push(Row {
        path: path.to_string(),
        offset,
        size: layout.byte_size(),
        layout: layout.to_string(),
    });
    collect_rows(layout, path, offset, rows);
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = if verbose { "debug" } else { "warn" };
    let subscriber = fmt::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    let mut layout = Layout::from_json(&buf)?;
    tracing::debug!(layout = %layout, "read layout");

    if let Some(order) = args.byte_order {
        layout = transform::with_byte_order(&layout, order.into())?;
    }

    let mut members = Vec::new();
    collect_rows(&layout, "", 0, &mut members);
    let report = Report {
        layout: layout.to_string(),
        size: layout.byte_size(),
        alignment: layout.byte_alignment(),
        fingerprint: format!("{:016x}", layout.fingerprint()),
        members,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.layout);
        println!(
            "size {}, alignment {}, fingerprint {}",
            report.size, report.alignment, report.fingerprint
        );
        for row in report.members.iter() {
            println!("{:>8} {:>6}  {:<24} {}", row.offset, row.size, row.path, row.layout);
        }
    }

    if let Some(output) = args.output {
        std::fs::write(&output, layout.to_json_pretty()?)?;
        tracing::info!(output = %output, "wrote layout");
    }
    Ok(())
}
