use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::models::expense::{Category, Expense, NewExpense};

const EXPENSE_COLUMNS: &str = "e.id, e.user_id, e.title, e.amount_cents, e.category, e.date,
                               e.note, e.currency, e.created_at, e.updated_at";

/// Filter for listing one user's expenses. `user_id` is mandatory so no query
/// can cross ownership boundaries.
pub struct ExpenseFilter {
    pub user_id: i64,
    /// Case-insensitive substring match over title, category and note.
    pub search: Option<String>,
    pub category: Option<Category>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ExpenseFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            search: None,
            category: None,
            from_date: None,
            to_date: None,
            limit: None,
            offset: None,
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }

    fn where_clause(&self, sql: &mut String, params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>) {
        sql.push_str(" WHERE e.user_id = ?");
        params_vec.push(Box::new(self.user_id));

        if let Some(ref search) = self.search {
            let pattern = format!("%{}%", search.trim());
            sql.push_str(" AND (e.title LIKE ? OR e.category LIKE ? OR IFNULL(e.note, '') LIKE ?)");
            for _ in 0..3 {
                params_vec.push(Box::new(pattern.clone()));
            }
        }
        if let Some(category) = self.category {
            sql.push_str(" AND e.category = ?");
            params_vec.push(Box::new(category.as_str()));
        }
        if let Some(from) = self.from_date {
            sql.push_str(" AND e.date >= ?");
            params_vec.push(Box::new(date_to_sql(from)));
        }
        if let Some(to) = self.to_date {
            sql.push_str(" AND e.date <= ?");
            params_vec.push(Box::new(date_to_sql(to)));
        }
    }
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let category: String = row.get(4)?;
    let date: String = row.get(5)?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        amount_cents: row.get(3)?,
        category: category.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
        })?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        note: row.get(6)?,
        currency: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Newest first.
pub fn list_expenses(conn: &Connection, filter: &ExpenseFilter) -> rusqlite::Result<Vec<Expense>> {
    let mut sql = format!("SELECT {} FROM expenses e", EXPENSE_COLUMNS);
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    filter.where_clause(&mut sql, &mut params_vec);

    sql.push_str(" ORDER BY e.date DESC, e.created_at DESC, e.rowid DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        params_vec.push(Box::new(limit));
        if let Some(offset) = filter.offset {
            sql.push_str(" OFFSET ?");
            params_vec.push(Box::new(offset));
        }
    }

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let expenses = stmt
        .query_map(params_refs.as_slice(), row_to_expense)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(user_id = filter.user_id, count = expenses.len(), "Listed expenses");
    Ok(expenses)
}

pub fn count_expenses(conn: &Connection, filter: &ExpenseFilter) -> rusqlite::Result<i64> {
    let mut sql = String::from("SELECT COUNT(*) FROM expenses e");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    filter.where_clause(&mut sql, &mut params_vec);

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))
}

pub fn sum_amount_cents(conn: &Connection, filter: &ExpenseFilter) -> rusqlite::Result<i64> {
    let mut sql = String::from("SELECT COALESCE(SUM(e.amount_cents), 0) FROM expenses e");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    filter.where_clause(&mut sql, &mut params_vec);

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))
}

pub fn get_expense(conn: &Connection, user_id: i64, id: &str) -> rusqlite::Result<Option<Expense>> {
    trace!(expense_id = id, user_id, "Fetching expense");
    conn.query_row(
        &format!(
            "SELECT {} FROM expenses e WHERE e.id = ? AND e.user_id = ?",
            EXPENSE_COLUMNS
        ),
        params![id, user_id],
        row_to_expense,
    )
    .optional()
}

/// Insert an expense and return its generated id.
pub fn create_expense(
    conn: &Connection,
    user_id: i64,
    expense: &NewExpense,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO expenses (id, user_id, title, amount_cents, category, date, note, currency)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            user_id,
            expense.title,
            expense.amount_cents,
            expense.category.as_str(),
            date_to_sql(expense.date),
            expense.note,
            expense.currency,
        ],
    )?;
    debug!(expense_id = %id, user_id, "Inserted expense");
    Ok(id)
}

/// Replace every editable field. Returns `false` when the expense does not
/// exist or belongs to someone else.
pub fn update_expense(
    conn: &Connection,
    user_id: i64,
    id: &str,
    expense: &NewExpense,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE expenses
         SET title = ?, amount_cents = ?, category = ?, date = ?, note = ?, currency = ?,
             updated_at = datetime('now')
         WHERE id = ? AND user_id = ?",
        params![
            expense.title,
            expense.amount_cents,
            expense.category.as_str(),
            date_to_sql(expense.date),
            expense.note,
            expense.currency,
            id,
            user_id,
        ],
    )?;
    Ok(rows > 0)
}

pub fn delete_expense(conn: &Connection, user_id: i64, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM expenses WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::db::queries::users;
    use std::path::Path;

    fn setup() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn, Path::new("migrations")).unwrap();
        let user_id = users::create_user(&conn, "owner@example.com", "hash").unwrap();
        (conn, user_id)
    }

    fn new_expense(title: &str, cents: i64, category: Category, day: u32) -> NewExpense {
        NewExpense {
            title: title.into(),
            amount_cents: cents,
            category,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            note: None,
            currency: None,
        }
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let (conn, user_id) = setup();
        let input = new_expense("Lunch", 1250, Category::Food, 4);
        let id = create_expense(&conn, user_id, &input).unwrap();

        let stored = get_expense(&conn, user_id, &id).unwrap().unwrap();
        assert_eq!(stored.title, "Lunch");
        assert_eq!(stored.amount_cents, 1250);
        assert_eq!(stored.category, Category::Food);
        assert_eq!(stored.date, input.date);
    }

    #[test]
    fn test_other_users_cannot_see_or_touch_expense() {
        let (conn, owner) = setup();
        let intruder = users::create_user(&conn, "intruder@example.com", "hash").unwrap();
        let id = create_expense(&conn, owner, &new_expense("Rent", 100000, Category::Rent, 1))
            .unwrap();

        assert!(get_expense(&conn, intruder, &id).unwrap().is_none());
        assert!(!update_expense(&conn, intruder, &id, &new_expense("x", 1, Category::Other, 1))
            .unwrap());
        assert!(!delete_expense(&conn, intruder, &id).unwrap());
        assert!(get_expense(&conn, owner, &id).unwrap().is_some());
    }

    #[test]
    fn test_search_matches_title_category_and_note() {
        let (conn, user_id) = setup();
        create_expense(&conn, user_id, &new_expense("Flat white", 450, Category::Coffee, 2))
            .unwrap();
        let mut with_note = new_expense("Bus", 275, Category::Transportation, 3);
        with_note.note = Some("Commute to office".into());
        create_expense(&conn, user_id, &with_note).unwrap();

        let mut filter = ExpenseFilter::for_user(user_id);
        filter.search = Some("COFFEE".into());
        assert_eq!(list_expenses(&conn, &filter).unwrap().len(), 1);

        filter.search = Some("office".into());
        let found = list_expenses(&conn, &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Bus");
    }

    #[test]
    fn test_date_range_sum_and_count() {
        let (conn, user_id) = setup();
        create_expense(&conn, user_id, &new_expense("a", 1000, Category::Food, 1)).unwrap();
        create_expense(&conn, user_id, &new_expense("b", 500, Category::Food, 15)).unwrap();
        create_expense(&conn, user_id, &new_expense("c", 9999, Category::Food, 31)).unwrap();

        let filter = ExpenseFilter::for_user(user_id).between(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        assert_eq!(sum_amount_cents(&conn, &filter).unwrap(), 1500);
        assert_eq!(count_expenses(&conn, &filter).unwrap(), 2);
    }

    #[test]
    fn test_list_is_newest_first() {
        let (conn, user_id) = setup();
        create_expense(&conn, user_id, &new_expense("old", 100, Category::Food, 1)).unwrap();
        create_expense(&conn, user_id, &new_expense("new", 100, Category::Food, 20)).unwrap();

        let listed = list_expenses(&conn, &ExpenseFilter::for_user(user_id)).unwrap();
        assert_eq!(listed[0].title, "new");
        assert_eq!(listed[1].title, "old");
    }
}
