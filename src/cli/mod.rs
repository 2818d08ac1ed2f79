use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::LedgerService;
use crate::domain::{Grams, format_cents, parse_cents};
use crate::io::Exporter;

/// Cuppa - Shared-office coffee-credit ledger
#[derive(Parser)]
#[command(name = "cuppa")]
#[command(about = "A shared-office coffee-credit ledger: balances, doses, stock")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "cuppa.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Register a new account
    Register {
        /// Display name
        name: String,

        /// External identifier used at the machine (employee/student number)
        #[arg(short, long)]
        matricula: String,

        /// Opening balance (e.g. "10.00"), defaults to 0
        #[arg(short, long)]
        balance: Option<String>,
    },

    /// List all accounts
    Accounts,

    /// Show one account
    Account {
        /// Matricula of the account
        matricula: String,
    },

    /// Overwrite an account's name, matricula and balance
    Update {
        /// Account ID
        id: String,

        /// New display name
        #[arg(long)]
        name: String,

        /// New matricula
        #[arg(long)]
        matricula: String,

        /// New balance (e.g. "10.00")
        #[arg(long)]
        balance: String,
    },

    /// Delete an account (its ledger entries are kept)
    Remove {
        /// Account ID
        id: String,
    },

    /// Consume one dose
    Consume {
        /// Matricula of the account
        matricula: String,
    },

    /// Recharge a balance
    Recharge {
        /// Matricula of the account
        matricula: String,

        /// Amount to credit (e.g. "5.00")
        amount: String,
    },

    /// Stock management commands
    #[command(subcommand)]
    Stock(StockCommands),

    /// Show or set the dose size
    Dose {
        /// New dose size in grams
        #[arg(long)]
        set: Option<Grams>,
    },

    /// Show the composite system view (stock, dose, current price)
    System {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent ledger activity
    Activity {
        /// Restrict to one account
        #[arg(short, long)]
        matricula: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<i64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: entries, accounts
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv (default), json
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Show current stock and cost basis
    Show,

    /// Add an intake lot
    Add {
        /// Added mass in grams
        grams: Grams,

        /// Cost of the lot (e.g. "50.00"), defaults to 0 for donated stock
        #[arg(short, long)]
        cost: Option<String>,
    },

    /// Override both stock fields (admin correction)
    Set {
        /// Remaining mass in grams
        grams: Grams,

        /// Cost basis of the remaining mass (e.g. "42.00")
        #[arg(short, long)]
        cost: String,
    },

    /// Set the payment QR reference
    Qr {
        /// Opaque reference (URL or path) to the QR image
        reference: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Initialized coffee ledger at {}", self.database);
                Ok(())
            }
            command => {
                let service = LedgerService::connect(&self.database).await?;
                run_command(&service, command).await
            }
        }
    }
}

async fn run_command(service: &LedgerService, command: Commands) -> Result<()> {
    match command {
        Commands::Init => unreachable!("handled before connecting"),

        Commands::Register {
            name,
            matricula,
            balance,
        } => {
            let balance_cents = match balance {
                Some(b) => parse_cents(&b).context("Invalid balance")?,
                None => 0,
            };
            let account = service
                .register_account(name, matricula, balance_cents)
                .await?;
            println!(
                "Registered {} (matricula {}), balance {}",
                account.name,
                account.matricula,
                format_cents(account.balance_cents)
            );
            println!("ID: {}", account.id);
        }

        Commands::Accounts => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts registered.");
                return Ok(());
            }
            println!(
                "{:<36}  {:<12}  {:<24}  {:>10}",
                "ID", "MATRICULA", "NAME", "BALANCE"
            );
            for account in accounts {
                println!(
                    "{:<36}  {:<12}  {:<24}  {:>10}",
                    account.id,
                    account.matricula,
                    account.name,
                    format_cents(account.balance_cents)
                );
            }
        }

        Commands::Account { matricula } => {
            let account = service.account_by_matricula(&matricula).await?;
            println!("Name:      {}", account.name);
            println!("Matricula: {}", account.matricula);
            println!("Balance:   {}", format_cents(account.balance_cents));
            println!("Created:   {}", account.created_at.format("%Y-%m-%d %H:%M"));
            println!("ID:        {}", account.id);
        }

        Commands::Update {
            id,
            name,
            matricula,
            balance,
        } => {
            let id = Uuid::parse_str(&id).context("Invalid account ID")?;
            let balance_cents = parse_cents(&balance).context("Invalid balance")?;
            let account = service
                .update_account(id, name, matricula, balance_cents)
                .await?;
            println!(
                "Updated {} (matricula {}), balance {}",
                account.name,
                account.matricula,
                format_cents(account.balance_cents)
            );
        }

        Commands::Remove { id } => {
            let id = Uuid::parse_str(&id).context("Invalid account ID")?;
            let account = service.delete_account(id).await?;
            println!(
                "Removed {} (matricula {}); ledger entries kept",
                account.name, account.matricula
            );
        }

        Commands::Consume { matricula } => {
            let receipt = service.consume(&matricula).await?;
            println!(
                "Dose poured for {}: charged {}, new balance {}",
                receipt.matricula,
                format_cents(receipt.price_cents),
                format_cents(receipt.new_balance_cents)
            );
        }

        Commands::Recharge { matricula, amount } => {
            let amount_cents = parse_cents(&amount).context("Invalid amount")?;
            let receipt = service.recharge(&matricula, amount_cents).await?;
            println!(
                "Recharged {} with {}, new balance {}",
                receipt.matricula,
                format_cents(receipt.amount_cents),
                format_cents(receipt.new_balance_cents)
            );
        }

        Commands::Stock(stock_command) => run_stock_command(service, stock_command).await?,

        Commands::Dose { set } => match set {
            Some(grams) => {
                service.set_dose_grams(grams).await?;
                println!("Dose size set to {}g", grams);
            }
            None => {
                let grams = service.dose_grams().await?;
                println!("Dose size: {}g", grams);
            }
        },

        Commands::System { json } => {
            let view = service.system_view().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("Stock:          {}g", view.coffee_stock_grams);
                println!(
                    "Cost basis:     {}",
                    format_cents(view.stock_total_cost_cents)
                );
                println!("Dose:           {}g", view.dose_grams);
                println!(
                    "Price per dose: {}",
                    format_cents(view.price_per_dose_cents)
                );
                if view.qr_code_reference.is_empty() {
                    println!("QR reference:   (none)");
                } else {
                    println!("QR reference:   {}", view.qr_code_reference);
                }
            }
        }

        Commands::Activity {
            matricula,
            limit,
            json,
        } => match matricula {
            Some(matricula) => {
                let entries = service.account_activity(&matricula, limit).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                    return Ok(());
                }
                for entry in entries {
                    println!(
                        "{}  {:<11}  {:>10}",
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        entry.kind,
                        format_cents(entry.amount_cents)
                    );
                }
            }
            None => {
                let entries = service.recent_activity(limit).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                    return Ok(());
                }
                for item in entries {
                    println!(
                        "{}  {:<11}  {:>10}  {} ({})",
                        item.entry.timestamp.format("%Y-%m-%d %H:%M"),
                        item.entry.kind,
                        format_cents(item.entry.amount_cents),
                        item.account_name.as_deref().unwrap_or("(deleted)"),
                        item.matricula.as_deref().unwrap_or("-")
                    );
                }
            }
        },

        Commands::Check => {
            let stats = service.check_ledger().await?;
            println!("Accounts:        {}", stats.account_count);
            println!("Ledger entries:  {}", stats.entry_count);
            println!(
                "Sequence gaps:   {}",
                if stats.has_sequence_gaps { "YES" } else { "no" }
            );
            println!("Orphaned entries: {}", stats.orphaned_entries);
        }

        Commands::Export {
            export_type,
            output,
            format,
        } => {
            let format = format.as_deref().unwrap_or("csv").to_lowercase();
            let writer: Box<dyn std::io::Write> = match &output {
                Some(path) => Box::new(
                    std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path))?,
                ),
                None => Box::new(std::io::stdout()),
            };

            let exporter = Exporter::new(service);
            let count = match (export_type.as_str(), format.as_str()) {
                ("entries", "csv") => exporter.export_entries_csv(writer).await?,
                ("entries", "json") => exporter.export_entries_json(writer).await?,
                ("accounts", "csv") => exporter.export_accounts_csv(writer).await?,
                ("accounts", "json") => exporter.export_accounts_json(writer).await?,
                _ => anyhow::bail!(
                    "Unknown export: {} as {} (expected entries|accounts, csv|json)",
                    export_type,
                    format
                ),
            };

            if let Some(path) = output {
                eprintln!("Exported {} records to {}", count, path);
            }
        }
    }

    Ok(())
}

async fn run_stock_command(service: &LedgerService, command: StockCommands) -> Result<()> {
    match command {
        StockCommands::Show => {
            let view = service.system_view().await?;
            println!(
                "Stock: {}g, cost basis {}, price per {}g dose {}",
                view.coffee_stock_grams,
                format_cents(view.stock_total_cost_cents),
                view.dose_grams,
                format_cents(view.price_per_dose_cents)
            );
        }

        StockCommands::Add { grams, cost } => {
            let cost_cents = match cost {
                Some(c) => parse_cents(&c).context("Invalid cost")?,
                None => 0,
            };
            let stock = service.add_stock(grams, cost_cents).await?;
            println!(
                "Stock is now {}g, cost basis {}",
                stock.coffee_stock_grams,
                format_cents(stock.stock_total_cost_cents)
            );
        }

        StockCommands::Set { grams, cost } => {
            let cost_cents = parse_cents(&cost).context("Invalid cost")?;
            let stock = service.override_stock(grams, cost_cents).await?;
            println!(
                "Stock overridden to {}g, cost basis {}",
                stock.coffee_stock_grams,
                format_cents(stock.stock_total_cost_cents)
            );
        }

        StockCommands::Qr { reference } => {
            service.set_qr_reference(&reference).await?;
            println!("QR reference updated");
        }
    }

    Ok(())
}
