//! Command-line interface.

use anyhow::Result;
use clap::{Parser, Subcommand};

use commerce_hex::{CurrencyService, CustomerGroupService, CustomerService};
use commerce_types::{
    CreateCustomerGroupRequest, CreateCustomerRequest, CustomerGroupId, CustomerId, ListFilter,
    Metadata, Pagination, RepositoryProvider, TransactionalConnection, UpdateCurrencyRequest,
    UpdateCustomerGroupRequest,
};

#[derive(Parser)]
#[command(name = "commerce")]
#[command(author, version, about = "Commerce backend CLI", long_about = None)]
pub struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Currency operations
    Currency {
        #[command(subcommand)]
        action: CurrencyCommands,
    },
    /// Customer operations
    Customer {
        #[command(subcommand)]
        action: CustomerCommands,
    },
    /// Customer group operations
    Group {
        #[command(subcommand)]
        action: GroupCommands,
    },
}

#[derive(clap::Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0)]
    skip: i64,
    #[arg(long, default_value_t = Pagination::DEFAULT_TAKE)]
    take: i64,
}

impl PageArgs {
    fn pagination(&self) -> Pagination {
        Pagination::new(self.skip, self.take)
    }
}

#[derive(Subcommand)]
pub enum CurrencyCommands {
    /// List currencies
    List {
        /// Case-insensitive search on code and name
        #[arg(long)]
        q: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a currency by code
    Get {
        /// Currency code (e.g. usd)
        code: String,
    },
    /// Update a currency
    Update {
        code: String,
        #[arg(long)]
        includes_tax: Option<bool>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Create a customer
    Create {
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List customers
    List {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a customer group, optionally with initial members
    Create {
        name: String,
        /// JSON object
        #[arg(long)]
        metadata: Option<String>,
        /// Customer IDs to add (comma-separated)
        #[arg(long, value_delimiter = ',')]
        customers: Vec<String>,
    },
    /// Get a customer group
    Get { id: String },
    /// List customer groups
    List {
        /// Case-insensitive search on name
        #[arg(long)]
        q: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Rename a group or merge metadata into it (null values remove keys)
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Delete a customer group
    Delete { id: String },
    /// Add customers to a group
    AddCustomers {
        id: String,
        #[arg(required = true)]
        customers: Vec<String>,
    },
    /// Remove customers from a group
    RemoveCustomers {
        id: String,
        #[arg(required = true)]
        customers: Vec<String>,
    },
    /// List a group's members
    Members { id: String },
}

/// The services a command runs against.
pub struct Services<C: TransactionalConnection> {
    pub currencies: CurrencyService<C>,
    pub customers: CustomerService<C>,
    pub groups: CustomerGroupService<C>,
}

fn parse_group_id(s: &str) -> Result<CustomerGroupId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid customer group ID: {}", s))
}

fn parse_customer_ids(ids: &[String]) -> Result<Vec<CustomerId>> {
    ids.iter()
        .map(|s| {
            s.parse()
                .map_err(|_| anyhow::anyhow!("Invalid customer ID: {}", s))
        })
        .collect()
}

fn parse_metadata(s: Option<&str>) -> Result<Option<Metadata>> {
    s.map(|s| {
        serde_json::from_str(s).map_err(|e| anyhow::anyhow!("Invalid metadata JSON: {}", e))
    })
    .transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one command and prints its result as JSON.
pub async fn execute<C>(command: Commands, services: &Services<C>) -> Result<()>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    match command {
        Commands::Currency { action } => match action {
            CurrencyCommands::List { q, page } => {
                let currencies = services
                    .currencies
                    .list_and_count(None, ListFilter { q }, page.pagination())
                    .await?;
                print_json(&currencies)?;
            }
            CurrencyCommands::Get { code } => {
                let currency = services.currencies.retrieve_by_code(None, &code).await?;
                print_json(&currency)?;
            }
            CurrencyCommands::Update { code, includes_tax } => {
                let currency = services
                    .currencies
                    .update(None, &code, UpdateCurrencyRequest { includes_tax })
                    .await?;
                print_json(&currency)?;
            }
        },

        Commands::Customer { action } => match action {
            CustomerCommands::Create {
                email,
                first_name,
                last_name,
            } => {
                let customer = services
                    .customers
                    .create(
                        None,
                        CreateCustomerRequest {
                            email,
                            first_name,
                            last_name,
                        },
                    )
                    .await?;
                print_json(&customer)?;
            }
            CustomerCommands::List { page } => {
                let customers = services
                    .customers
                    .list_and_count(None, page.pagination())
                    .await?;
                print_json(&customers)?;
            }
        },

        Commands::Group { action } => match action {
            GroupCommands::Create {
                name,
                metadata,
                customers,
            } => {
                let req = CreateCustomerGroupRequest {
                    name,
                    metadata: parse_metadata(metadata.as_deref())?,
                };
                let customer_ids = parse_customer_ids(&customers)?;
                let group = if customer_ids.is_empty() {
                    services.groups.create(None, req).await?
                } else {
                    services
                        .groups
                        .create_with_customers(None, req, &customer_ids)
                        .await?
                };
                print_json(&group)?;
            }
            GroupCommands::Get { id } => {
                let group = services.groups.retrieve(None, parse_group_id(&id)?).await?;
                print_json(&group)?;
            }
            GroupCommands::List { q, page } => {
                let groups = services
                    .groups
                    .list_and_count(None, ListFilter { q }, page.pagination())
                    .await?;
                print_json(&groups)?;
            }
            GroupCommands::Update { id, name, metadata } => {
                let req = UpdateCustomerGroupRequest {
                    name,
                    metadata: parse_metadata(metadata.as_deref())?,
                };
                let group = services
                    .groups
                    .update(None, parse_group_id(&id)?, req)
                    .await?;
                print_json(&group)?;
            }
            GroupCommands::Delete { id } => {
                services.groups.delete(None, parse_group_id(&id)?).await?;
                println!("✓ Customer group deleted");
            }
            GroupCommands::AddCustomers { id, customers } => {
                let group = services
                    .groups
                    .add_customers(None, parse_group_id(&id)?, &parse_customer_ids(&customers)?)
                    .await?;
                print_json(&group)?;
            }
            GroupCommands::RemoveCustomers { id, customers } => {
                let group = services
                    .groups
                    .remove_customers(None, parse_group_id(&id)?, &parse_customer_ids(&customers)?)
                    .await?;
                print_json(&group)?;
            }
            GroupCommands::Members { id } => {
                let customers = services
                    .groups
                    .list_customers(None, parse_group_id(&id)?)
                    .await?;
                print_json(&customers)?;
            }
        },
    }

    Ok(())
}
