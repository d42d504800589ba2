use crate::models::{Device, NewDevice, NewPairingCode, PairingCode};
use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::Rng;

const CODE_LEN: usize = 6;
// No 0/O/1/I: codes get typed off a TV screen.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("invalid pairing code")]
    InvalidCode,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Issues a short-lived link code for the dashboard's link-device flow.
pub fn create_pairing_code(
    conn: &mut SqliteConnection,
    for_account_id: i32,
    name: &str,
    ttl: Duration,
    now: NaiveDateTime,
) -> Result<PairingCode, diesel::result::Error> {
    use crate::schema::pairing_codes;

    let new_code = NewPairingCode {
        account_id: for_account_id,
        code: generate_code(),
        device_name: name.to_string(),
        expires_at: now + ttl,
    };

    diesel::insert_into(pairing_codes::table)
        .values(&new_code)
        .returning(PairingCode::as_select())
        .get_result(conn)
}

/// Redeems a pairing code, binding a new device to the code's account.
///
/// Single use: unknown, expired, and already-redeemed codes all fail with
/// `InvalidCode`. Runs in one transaction so a failed redemption leaves no
/// partial state.
pub fn redeem(
    conn: &mut SqliteConnection,
    submitted_code: &str,
    now: NaiveDateTime,
) -> Result<Device, PairingError> {
    use crate::schema::{devices, pairing_codes};

    conn.transaction::<Device, PairingError, _>(|conn| {
        let pairing: PairingCode = pairing_codes::table
            .filter(pairing_codes::code.eq(submitted_code))
            .select(PairingCode::as_select())
            .first(conn)
            .optional()?
            .ok_or(PairingError::InvalidCode)?;

        if pairing.redeemed_at.is_some() || pairing.expires_at < now {
            return Err(PairingError::InvalidCode);
        }

        let new_device = NewDevice {
            account_id: pairing.account_id,
            name: pairing.device_name.clone(),
            secret_key: uuid::Uuid::new_v4().to_string(),
            status: "offline".to_string(),
        };

        let device: Device = diesel::insert_into(devices::table)
            .values(&new_device)
            .returning(Device::as_select())
            .get_result(conn)?;

        // Retire the code.
        diesel::update(pairing_codes::table.filter(pairing_codes::id.eq(pairing.id)))
            .set((
                pairing_codes::redeemed_at.eq(now),
                pairing_codes::device_id.eq(device.id),
            ))
            .execute(conn)?;

        Ok(device)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAccount;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn test_conn(dir: &tempfile::TempDir) -> SqliteConnection {
        let db_path = dir.path().join("pairing.db");
        let mut conn = SqliteConnection::establish(db_path.to_str().unwrap()).unwrap();
        crate::db::run_migrations(&mut conn).unwrap();

        diesel::insert_into(crate::schema::accounts::table)
            .values(NewAccount {
                name: "default".to_string(),
            })
            .execute(&mut conn)
            .unwrap();

        conn
    }

    fn device_count(conn: &mut SqliteConnection) -> i64 {
        use crate::schema::devices::dsl::*;
        devices.count().get_result(conn).unwrap()
    }

    #[test]
    fn generated_codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn code_redeems_once_then_becomes_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = test_conn(&dir);

        let pairing =
            create_pairing_code(&mut conn, 1, "lobby screen", Duration::minutes(15), dt(12, 0))
                .unwrap();

        let device = redeem(&mut conn, &pairing.code, dt(12, 5)).unwrap();
        assert_eq!(device.account_id, 1);
        assert_eq!(device.name, "lobby screen");
        assert!(!device.secret_key.is_empty());

        let err = redeem(&mut conn, &pairing.code, dt(12, 6)).unwrap_err();
        assert!(matches!(err, PairingError::InvalidCode));
        // Second attempt created nothing.
        assert_eq!(device_count(&mut conn), 1);
    }

    #[test]
    fn expired_code_is_invalid_and_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = test_conn(&dir);

        let pairing =
            create_pairing_code(&mut conn, 1, "window display", Duration::minutes(15), dt(12, 0))
                .unwrap();

        let err = redeem(&mut conn, &pairing.code, dt(12, 16)).unwrap_err();
        assert!(matches!(err, PairingError::InvalidCode));
        assert_eq!(device_count(&mut conn), 0);

        use crate::schema::pairing_codes::dsl::*;
        let reloaded: PairingCode = pairing_codes
            .filter(id.eq(pairing.id))
            .select(PairingCode::as_select())
            .first(&mut conn)
            .unwrap();
        assert!(reloaded.redeemed_at.is_none());
    }

    #[test]
    fn unknown_code_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = test_conn(&dir);

        let err = redeem(&mut conn, "ABC234", dt(12, 0)).unwrap_err();
        assert!(matches!(err, PairingError::InvalidCode));
    }
}
