use clap::{Parser, Subcommand};
use moneyspend::{
    AppError, DATE_FORMAT, EntryForm, create_report,
    config::Config,
    number_formatter::{FormatOptions, NumberFormatter},
    permission::{FilesystemGate, Permission, PermissionGate},
    report::{self, ReportOptions},
    save_entry, server,
    store::{MemoryStore, RemoteStore, SpendStore},
    tui::{self, Services},
    viewer::open_report,
};
use std::fmt::Display;
use std::io::IsTerminal;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "moneyspend")]
#[command(version, about = "Record daily spending in a remote store and turn it into a PDF report", long_about = None)]
struct Cli {
    /// Path to a TOML config file, layered over the global one
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the remote store (overrides `store.url`)
    #[arg(long, global = true)]
    store_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save one spending entry
    NewEntry {
        /// Amount spent, a whole non-negative number
        #[arg(short, long, allow_hyphen_values = true)]
        amount: String,
        /// What the money was spent on
        #[arg(short, long)]
        cause: String,
        /// Date of the entry as dd/mm/yyyy (defaults to today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Fetch every entry and write the PDF report
    Report {
        /// Directory receiving the report (defaults to <documents>/MyAppPDFs)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Do not open the report once written
        #[arg(long)]
        no_open: bool,
    },
    /// Print every stored entry with the total
    List,
    /// Open the interactive entry form
    Tui,
    /// Serve an in-memory store speaking the remote store's REST dialect
    Emulator {
        #[arg(short, long, default_value_t = 9000)]
        port: u16,
    },
}

fn main() -> Result<(), main_error::MainError> {
    let cli = Cli::parse();
    init_tracing(cli.command.logs_to_stderr());

    let config = Config::load(Config::global_config_path(), cli.config.as_ref());
    let format_options = config.formatting.format_options();
    let runtime = tokio::runtime::Runtime::new().map_err(|source| AppError::Io {
        source,
        context: "Failed to start async runtime".to_string(),
    })?;

    match cli.command {
        Commands::NewEntry {
            amount,
            cause,
            date,
        } => {
            let store = remote_store(&config, cli.store_url)?;
            let date = date.unwrap_or_else(|| {
                chrono::Local::now()
                    .date_naive()
                    .format(DATE_FORMAT)
                    .to_string()
            });
            let form = EntryForm::new(date, amount, cause);
            runtime.block_on(save_entry(&store, &form))?;
            println!("Data saved successfully");
        }
        Commands::Report {
            output_dir,
            no_open,
        } => {
            let store = remote_store(&config, cli.store_url)?;
            let options = report_options(&config, output_dir, no_open)?;
            let gate = permission_gate(&config);
            runtime.block_on(async {
                let generated = create_report(&store, gate.as_ref(), &options).await?;
                println!("PDF saved to {}", generated.path.display());
                if options.open_viewer {
                    open_report(&generated.path, options.viewer.as_deref()).await?;
                }
                Ok::<(), AppError>(())
            })?;
        }
        Commands::List => {
            let store = remote_store(&config, cli.store_url)?;
            let entries = runtime
                .block_on(store.fetch_all())
                .map_err(AppError::ReadFailed)?;
            let listing = Listing::new(&entries, &format_options)?;
            print!("{listing}");
        }
        Commands::Tui => {
            let services = Services {
                store: remote_store(&config, cli.store_url)?,
                gate: permission_gate(&config),
                report: report_options(&config, None, false)?,
            };
            tui::run_tui(services, runtime.handle(), format_options)?;
        }
        Commands::Emulator { port } => {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::bind(addr)
                    .await
                    .map_err(AppError::Emulator)?;
                println!("Store emulator listening on http://{addr}");
                server::serve(listener, MemoryStore::default()).await
            })?;
        }
    }

    Ok(())
}

impl Commands {
    /// The TUI owns the terminal, so anything written to stderr would land on
    /// its screen.
    fn logs_to_stderr(&self) -> bool {
        !matches!(self, Commands::Tui)
    }
}

fn init_tracing(to_stderr: bool) {
    let filter = EnvFilter::try_from_env("MONEYSPEND_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if to_stderr {
        subscriber
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    } else {
        subscriber
            .with_writer(std::io::sink)
            .with_ansi(false)
            .init();
    }
}

fn remote_store(config: &Config, store_url: Option<String>) -> Result<RemoteStore, AppError> {
    let url = store_url
        .or_else(|| config.store.url.clone())
        .ok_or(AppError::StoreNotConfigured)?;
    RemoteStore::new(&url, config.store.auth.clone()).map_err(AppError::InvalidStoreUrl)
}

fn report_options(
    config: &Config,
    output_dir: Option<PathBuf>,
    no_open: bool,
) -> Result<ReportOptions, AppError> {
    let output_dir = match output_dir.or_else(|| config.report.output_dir.clone()) {
        Some(dir) => dir,
        None => report::default_output_dir()?,
    };
    Ok(ReportOptions {
        output_dir,
        open_viewer: config.report.open_viewer && !no_open,
        viewer: config.report.viewer.clone(),
    })
}

fn permission_gate(config: &Config) -> Arc<dyn PermissionGate> {
    if config.report.check_permission {
        Arc::new(FilesystemGate)
    } else {
        Arc::new(Permission::Granted)
    }
}

struct Listing {
    lines: Vec<(String, String)>,
    total: String,
}

impl Listing {
    fn new(
        entries: &[moneyspend::SpendEntry],
        format_options: &FormatOptions,
    ) -> Result<Self, AppError> {
        let mut lines = Vec::with_capacity(entries.len());
        let mut total: u64 = 0;
        for entry in entries {
            let amount = entry.amount_value()?;
            total = total.checked_add(amount).ok_or(AppError::TotalOverflow)?;
            lines.push((
                format!("{} {}:", entry.date, entry.cause),
                amount.format(format_options),
            ));
        }
        Ok(Listing {
            lines,
            total: total.format(format_options),
        })
    }
}

impl Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let final_line_prefix = "Total amount:";
        let max_prefix_len = self
            .lines
            .iter()
            .map(|(prefix, _)| prefix.chars().count())
            .chain([final_line_prefix.len()])
            .max()
            .unwrap_or_default();
        let max_suffix_len = self
            .lines
            .iter()
            .map(|(_, suffix)| suffix.chars().count())
            .chain([self.total.chars().count()])
            .max()
            .unwrap_or_default()
            + 1;

        for (prefix, suffix) in &self.lines {
            write!(f, "{prefix:>max_prefix_len$}")?;
            writeln!(f, "{suffix:>max_suffix_len$}")?;
        }

        write!(f, "{final_line_prefix:>max_prefix_len$}")?;
        writeln!(f, "{:>max_suffix_len$}", self.total)?;

        Ok(())
    }
}
