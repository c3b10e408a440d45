use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use commission_ledger::{NewUser, Role, create_user, initialize_db};

/// A utility for adding an admin user to the ledger database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. It is created if it does not exist.
    #[arg(long)]
    db_path: String,

    /// The fraction of each transaction's amount charged as commission.
    #[arg(long, default_value_t = 0.01)]
    commission_rate: f64,

    /// An optional wallet address for payouts.
    #[arg(long)]
    wallet: Option<String>,
}

/// Create an admin user and print its ID.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let db_path = Path::new(&args.db_path);
    if db_path.is_dir() {
        eprintln!("{db_path:#?} is a directory, expected a database file.");
        exit(1);
    }

    let conn = Connection::open(db_path)?;
    initialize_db(&conn)?;

    let new_user = NewUser::default()
        .role(Role::Admin)
        .commission_rate(args.commission_rate)
        .wallet_address(args.wallet.as_deref());

    let user = match create_user(new_user, &conn) {
        Ok(user) => user,
        Err(error) => {
            eprintln!("Could not create the admin user: {error}");
            exit(1);
        }
    };

    println!("Created admin user with ID {}", user.id);

    Ok(())
}
