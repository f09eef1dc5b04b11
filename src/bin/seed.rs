//! Seed the database with a starter set of detection patterns.
//!
//! Run with: `cargo run --bin seed`

use leakgate::models::pattern::SeverityLevel;

struct SeedPattern {
    name: &'static str,
    regex: &'static str,
    description: &'static str,
    severity: SeverityLevel,
}

const SEED_PATTERNS: &[SeedPattern] = &[
    SeedPattern {
        name: "credit_card",
        regex: r"\d{4}-\d{4}-\d{4}-\d{4}",
        description: "Payment card number in dashed groups of four",
        severity: SeverityLevel::Critical,
    },
    SeedPattern {
        name: "aws_access_key",
        regex: r"AKIA[0-9A-Z]{16}",
        description: "AWS access key id",
        severity: SeverityLevel::Critical,
    },
    SeedPattern {
        name: "private_key",
        regex: r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----",
        description: "PEM private key header",
        severity: SeverityLevel::Critical,
    },
    SeedPattern {
        name: "password_assignment",
        regex: r#"(?i)password\s*[=:]\s*\S+"#,
        description: "Inline password assignment",
        severity: SeverityLevel::High,
    },
    SeedPattern {
        name: "generic_api_key",
        regex: r#"(?i)api[_-]?key\s*[=:]\s*\S+"#,
        description: "Inline API key assignment",
        severity: SeverityLevel::High,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = leakgate::db::create_pool(&database_url, 2).await?;
    leakgate::db::run_migrations(&pool).await?;

    for seed in SEED_PATTERNS {
        let result = sqlx::query(
            r#"
            INSERT INTO patterns (name, regex, description, severity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(seed.name)
        .bind(seed.regex)
        .bind(seed.description)
        .bind(&seed.severity)
        .execute(&pool)
        .await?;

        if result.rows_affected() > 0 {
            println!("seeded pattern: {}", seed.name);
        } else {
            println!("pattern already present: {}", seed.name);
        }
    }

    Ok(())
}
