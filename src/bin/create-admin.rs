//! Bootstrap a staff account (admin by default, or teacher).
//!
//! Usage: create-admin --email E --name N --last-name L [--role teacher] [--password P]
//!   A password is generated and printed when --password is omitted.

use clap::{Parser, ValueEnum};

use anaokulu_api::{
    db,
    services::identity::{normalize_email, IdentityService},
};

#[derive(Clone, Copy, ValueEnum)]
enum StaffRole {
    Admin,
    Teacher,
}

#[derive(Parser)]
#[command(name = "create-admin", about = "Create an admin or teacher login")]
struct Args {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, value_enum, default_value = "admin")]
    role: StaffRole,
    /// Initial password (generated when omitted)
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let generated = args.password.is_none().then(IdentityService::generate_password);
    let password = args
        .password
        .as_deref()
        .or(generated.as_deref())
        .unwrap_or_default();

    let table = match args.role {
        StaffRole::Admin => "admins",
        StaffRole::Teacher => "teachers",
    };

    let mut tx = pool.begin().await?;
    let auth_user_id = IdentityService::create_account(&mut tx, &args.email, password).await?;
    let id: uuid::Uuid = sqlx::query_scalar(&format!(
        "INSERT INTO {table} (auth_user_id, name, last_name, email)
         VALUES ($1, $2, $3, $4)
         RETURNING id"
    ))
    .bind(auth_user_id)
    .bind(args.name.trim())
    .bind(args.last_name.trim())
    .bind(normalize_email(&args.email))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!("created {} row {} for {}", table, id, args.email);
    if let Some(password) = generated {
        println!("Generated password: {password}");
    }

    Ok(())
}
