//! Tests for the file-backed database: schema setup and persistence.

use budget_savvy::config::Config;
use budget_savvy::db::queries::{expenses, users};
use budget_savvy::models::{Category, NewExpense};
use budget_savvy::server::open_database;
use chrono::NaiveDate;
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> Config {
    let mut config = Config::for_tests();
    config.database_path = dir.path().join("data").join("budget.db");
    config
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let expense_id = {
        let db = open_database(&config).unwrap();
        let conn = db.get().unwrap();
        let user_id = users::create_user(&conn, "saver@example.com", "hash").unwrap();
        expenses::create_expense(
            &conn,
            user_id,
            &NewExpense {
                title: "Rent".into(),
                amount_cents: 120_000,
                category: Category::Housing,
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                note: None,
                currency: None,
            },
        )
        .unwrap()
    };

    assert!(config.database_path.exists());

    let db = open_database(&config).unwrap();
    let conn = db.get().unwrap();
    let user = users::find_by_email(&conn, "saver@example.com")
        .unwrap()
        .expect("user persisted");
    let expense = expenses::get_expense(&conn, user.id, &expense_id)
        .unwrap()
        .expect("expense persisted");
    assert_eq!(expense.title, "Rent");
    assert_eq!(expense.amount_cents, 120_000);
    assert_eq!(expense.category, Category::Housing);
}

#[test]
fn test_migrations_applied_once() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    open_database(&config).unwrap();
    let db = open_database(&config).unwrap();
    let conn = db.get().unwrap();
    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(applied, 1);
}

#[test]
fn test_expenses_scoped_to_owner() {
    let db = open_database(&Config::for_tests()).unwrap();
    let conn = db.get().unwrap();
    let alice = users::create_user(&conn, "alice@example.com", "hash").unwrap();
    let bob = users::create_user(&conn, "bob@example.com", "hash").unwrap();

    let id = expenses::create_expense(
        &conn,
        alice,
        &NewExpense {
            title: "Lunch".into(),
            amount_cents: 1250,
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            note: Some("with team".into()),
            currency: Some("EUR".into()),
        },
    )
    .unwrap();

    assert!(expenses::get_expense(&conn, bob, &id).unwrap().is_none());
    assert!(!expenses::delete_expense(&conn, bob, &id).unwrap());
    assert!(expenses::delete_expense(&conn, alice, &id).unwrap());
}
