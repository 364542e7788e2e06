#![allow(dead_code)]

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use portfolio::db::{connection, migrate};
use portfolio::models::Property;
use portfolio::plans::{config::load_plans_str, sync::sync_plans, DEFAULT_PLANS_TOML};
use portfolio::property::{self, PropertyInput};
use portfolio::types::Role;
use portfolio::users::{self, Caller, NewUserInput};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct FkViolation {
    #[diesel(sql_type = Text, column_name = "table")]
    _table: String,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    let rows: Vec<FkViolation> = diesel::sql_query("PRAGMA foreign_key_check;")
        .load(conn)
        .unwrap();
    assert!(rows.is_empty(), "foreign key violations: {}", rows.len());
}

/// basic 15.00/5.00 (max 5), professional 29.00/4.00 (max 25), enterprise 99.00/3.00.
pub fn seed_plans(conn: &mut SqliteConnection) {
    let cat = load_plans_str(DEFAULT_PLANS_TOML).unwrap();
    sync_plans(conn, &cat, Default::default()).unwrap();
}

pub fn user(conn: &mut SqliteConnection, email: &str, role: Role) -> Caller {
    let (u, _token) = users::create(
        conn,
        &NewUserInput {
            email: email.into(),
            name: email.split('@').next().unwrap_or("user").into(),
            role,
        },
        true,
    )
    .unwrap();
    Caller { id: u.id, role }
}

pub fn address() -> PropertyInput {
    PropertyInput {
        street: Some("12 Elm St".into()),
        city: Some("Springfield".into()),
        state: Some("IL".into()),
        postal_code: Some("62701".into()),
        property_type: Some("single_family".into()),
        ..Default::default()
    }
}

pub fn property_valued_at(conn: &mut SqliteConnection, owner: &Caller, cents: i64) -> Property {
    property::create(
        conn,
        owner,
        &PropertyInput {
            current_value_cents: Some(cents),
            ..address()
        },
    )
    .unwrap()
}
