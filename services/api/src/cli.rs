use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sgics::catalog::{import_geography_path, Catalog};
use sgics::error::AppError;
use sgics::people::RutCheckResponse;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "SGICS",
    about = "Run and operate the Scout course administration backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate and format Chilean RUTs
    Rut {
        #[command(subcommand)]
        command: RutCommand,
    },
    /// Work with the geography and organization catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Walk a preinscription and its payments through the full workflow in memory
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RutCommand {
    /// Check one or more RUTs and print their canonical form
    Check(RutCheckArgs),
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Dry-run a geography CSV import and report what it would create
    Import(CatalogImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
struct RutCheckArgs {
    /// RUTs in any common notation (12.345.678-5, 12345678-5, 123456785)
    #[arg(required = true)]
    ruts: Vec<String>,
}

#[derive(Args, Debug)]
struct CatalogImportArgs {
    /// CSV with region_code, region_name, province and commune columns
    #[arg(long)]
    csv: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rut {
            command: RutCommand::Check(args),
        } => {
            for line in rut_report(&args.ruts) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Catalog {
            command: CatalogCommand::Import(args),
        } => run_catalog_import(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn rut_report(ruts: &[String]) -> Vec<String> {
    ruts.iter()
        .map(|raw| {
            let check = RutCheckResponse::check(raw);
            match (check.formatted, check.error) {
                (Some(formatted), _) => format!("{raw}: valid ({formatted})"),
                (None, Some(error)) => format!("{raw}: invalid ({error})"),
                (None, None) => format!("{raw}: invalid"),
            }
        })
        .collect()
}

fn run_catalog_import(args: CatalogImportArgs) -> Result<(), AppError> {
    let catalog = Catalog::in_memory();
    let summary = import_geography_path(&catalog, &args.csv)?;
    println!("Geography import of {}", args.csv.display());
    println!("- {} rows read", summary.rows);
    println!(
        "- {} regions | {} provinces | {} communes",
        summary.regions_created, summary.provinces_created, summary.communes_created
    );
    Ok(())
}
