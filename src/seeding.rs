use crate::db::DbPool;
use crate::models::NewAccount;
use anyhow::Result;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

const DEFAULT_ACCOUNT_NAME: &str = "default";

pub fn seed_defaults(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    tracing::info!("Seeding default values...");

    seed_account(&mut conn)?;

    Ok(())
}

fn seed_account(conn: &mut SqliteConnection) -> Result<()> {
    use crate::schema::accounts::dsl::*;

    let exists: i64 = accounts
        .filter(name.eq(DEFAULT_ACCOUNT_NAME))
        .count()
        .get_result(conn)?;

    if exists == 0 {
        tracing::info!("Seeding account: {}", DEFAULT_ACCOUNT_NAME);
        let new_account = NewAccount {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
        };

        diesel::insert_into(accounts)
            .values(&new_account)
            .execute(conn)?;
    }

    Ok(())
}
