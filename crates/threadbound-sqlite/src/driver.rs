// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::Statement;
use threadbound_core::{
    Command, ConnectParams, Connection, Driver, DriverError, Record, RecordSet, Value,
};
use tracing::{debug, warn};

use crate::value::{driver_error, from_sql, to_sql};

/// Type name the SQLite driver registers under.
pub const DRIVER_NAME: &str = "sqlite";

/// Savepoint wrapping each batch so a failing row undoes the earlier ones.
const BATCH_SAVEPOINT: &str = "threadbound_batch";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, DriverError> {
        let path = params.database_name.as_str();
        let conn = if path.is_empty() || path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(driver_error)?;

        if params.host_name.is_some() || params.user_name.is_some() {
            warn!(database = path, "sqlite ignores host and user settings");
        }
        for (key, value) in params.option_pairs() {
            apply_option(&conn, key, value)?;
        }
        debug!(database = path, "sqlite connection opened");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// Apply one `key=value` connection option as a pragma.
fn apply_option(conn: &rusqlite::Connection, key: &str, value: &str) -> Result<(), DriverError> {
    if key == "busy_timeout" {
        let millis = value
            .parse::<u64>()
            .map_err(|_| DriverError::new(format!("invalid busy_timeout `{value}`")))?;
        return conn
            .busy_timeout(Duration::from_millis(millis))
            .map_err(driver_error);
    }
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DriverError::new(format!("invalid connection option `{key}`")));
    }
    let literal = format!("'{}'", value.replace('\'', "''"));
    let mut stmt = conn
        .prepare(&format!("PRAGMA {key} = {literal}"))
        .map_err(driver_error)?;
    // Some pragmas (journal_mode) answer with a row; drain it.
    let mut rows = stmt.raw_query();
    while rows.next().map_err(driver_error)?.is_some() {}
    Ok(())
}

/// A SQLite connection owned by one worker thread.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Run a command with scalar bindings once.
    fn run_once(&self, command: &Command) -> Result<RecordSet, DriverError> {
        let mut stmt = self.conn.prepare(&command.statement).map_err(driver_error)?;
        let positional = command
            .positional
            .iter()
            .map(|b| to_sql(&b.value))
            .collect::<Result<Vec<_>, _>>()?;
        let named = command
            .named
            .iter()
            .map(|b| Ok((b.placeholder.as_str(), to_sql(&b.value)?)))
            .collect::<Result<Vec<_>, DriverError>>()?;
        bind(&mut stmt, &positional, &named)?;
        self.step(&mut stmt)
    }

    /// Run a command once per element of its list bindings, inside a
    /// savepoint. Scalar bindings are repeated for every row.
    fn run_batch(&self, command: &Command) -> Result<RecordSet, DriverError> {
        let values = command
            .positional
            .iter()
            .map(|b| &b.value)
            .chain(command.named.iter().map(|b| &b.value));
        let mut rows: Option<usize> = None;
        for value in values {
            if let Value::List(items) = value {
                match rows {
                    Some(n) if n != items.len() => {
                        return Err(DriverError::new(format!(
                            "batch lists differ in length ({n} and {})",
                            items.len()
                        )));
                    }
                    _ => rows = Some(items.len()),
                }
            }
        }
        let rows = rows.unwrap_or(1);

        self.conn
            .execute_batch(&format!("SAVEPOINT {BATCH_SAVEPOINT}"))
            .map_err(driver_error)?;
        match self.batch_rows(command, rows) {
            Ok(set) => {
                self.conn
                    .execute_batch(&format!("RELEASE {BATCH_SAVEPOINT}"))
                    .map_err(driver_error)?;
                Ok(set)
            }
            Err(err) => {
                let undo = format!("ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT}");
                if let Err(rollback) = self.conn.execute_batch(&undo) {
                    warn!(error = %rollback, "batch savepoint rollback failed");
                }
                Err(err)
            }
        }
    }

    fn batch_rows(&self, command: &Command, rows: usize) -> Result<RecordSet, DriverError> {
        let mut stmt = self.conn.prepare(&command.statement).map_err(driver_error)?;
        let mut total = RecordSet::default();
        for row in 0..rows {
            let positional = command
                .positional
                .iter()
                .map(|b| to_sql(row_value(&b.value, row)))
                .collect::<Result<Vec<_>, _>>()?;
            let named = command
                .named
                .iter()
                .map(|b| Ok((b.placeholder.as_str(), to_sql(row_value(&b.value, row))?)))
                .collect::<Result<Vec<_>, DriverError>>()?;
            bind(&mut stmt, &positional, &named)?;
            let set = self.step(&mut stmt)?;
            total.rows_affected += set.rows_affected;
            total.records.extend(set.records);
            if set.last_insert_id.is_some() {
                total.last_insert_id = set.last_insert_id;
            }
        }
        debug!(rows, "sqlite batch executed");
        Ok(total)
    }

    /// Step a bound statement to completion and collect its records.
    fn step(&self, stmt: &mut Statement<'_>) -> Result<RecordSet, DriverError> {
        let readonly = stmt.readonly();
        let rowid_before = self.conn.last_insert_rowid();
        let mut set = RecordSet::default();

        if stmt.column_count() == 0 {
            set.rows_affected = stmt.raw_execute().map_err(driver_error)? as u64;
        } else {
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next().map_err(driver_error)? {
                let mut pairs = Vec::with_capacity(names.len());
                for (index, name) in names.iter().enumerate() {
                    let value: SqlValue = row.get(index).map_err(driver_error)?;
                    pairs.push((name.clone(), from_sql(value)));
                }
                set.records.push(Record::from_pairs(pairs));
            }
            if !readonly {
                set.rows_affected = u64::try_from(self.conn.changes()).unwrap_or(0);
            }
        }

        // SQLite only moves the last rowid on INSERT; UPDATE and DELETE leave
        // the one from an earlier statement in place.
        let rowid_after = self.conn.last_insert_rowid();
        if !readonly && set.rows_affected > 0 && rowid_after != rowid_before {
            set.last_insert_id = Some(Value::Integer(rowid_after));
        }
        Ok(set)
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, command: &Command) -> Result<RecordSet, DriverError> {
        if command.batch {
            self.run_batch(command)
        } else {
            self.run_once(command)
        }
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("BEGIN").map_err(driver_error)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT").map_err(driver_error)
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("ROLLBACK").map_err(driver_error)
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.close().map_err(|(_, err)| driver_error(err))
    }
}

/// The value of a batch binding for `row`: list elements per row, scalars
/// for every row.
fn row_value(value: &Value, row: usize) -> &Value {
    match value {
        Value::List(items) => items.get(row).unwrap_or(&Value::Null),
        scalar => scalar,
    }
}

fn bind(
    stmt: &mut Statement<'_>,
    positional: &[SqlValue],
    named: &[(&str, SqlValue)],
) -> Result<(), DriverError> {
    let expected = stmt.parameter_count();
    if positional.len() > expected {
        return Err(DriverError::new(format!(
            "statement takes {expected} parameters but {} were bound",
            positional.len()
        )));
    }
    for (offset, value) in positional.iter().enumerate() {
        stmt.raw_bind_parameter(offset + 1, value)
            .map_err(driver_error)?;
    }
    for (placeholder, value) in named {
        let index = stmt
            .parameter_index(placeholder)
            .map_err(driver_error)?
            .ok_or_else(|| DriverError::new(format!("no such placeholder `{placeholder}`")))?;
        stmt.raw_bind_parameter(index, value).map_err(driver_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadbound_core::{Binding, Direction, NamedBinding};

    fn memory() -> Box<dyn Connection> {
        SqliteDriver::new()
            .open(&ConnectParams::database(":memory:"))
            .unwrap()
    }

    fn with_positional(sql: &str, values: Vec<Value>) -> Command {
        Command {
            positional: values
                .into_iter()
                .map(|value| Binding {
                    value,
                    direction: Direction::In,
                })
                .collect(),
            ..Command::text(sql)
        }
    }

    fn create_people(conn: &mut Box<dyn Connection>) {
        conn.execute(&Command::text(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        ))
        .unwrap();
    }

    #[test]
    fn insert_then_select() {
        let mut conn = memory();
        create_people(&mut conn);

        let inserted = conn
            .execute(&with_positional(
                "INSERT INTO people (name) VALUES (?)",
                vec!["ada".into()],
            ))
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        assert_eq!(inserted.last_insert_id, Some(Value::Integer(1)));

        let selected = conn
            .execute(&Command::text("SELECT id, name FROM people"))
            .unwrap();
        assert_eq!(selected.records.len(), 1);
        let record = &selected.records[0];
        assert_eq!(record.value_by_name("id"), Some(&Value::Integer(1)));
        assert_eq!(record.value_by_name("name"), Some(&Value::Text("ada".into())));
        assert_eq!(selected.last_insert_id, None);
        conn.close().unwrap();
    }

    #[test]
    fn update_and_delete_report_no_insert_id() {
        let mut conn = memory();
        create_people(&mut conn);
        conn.execute(&Command::text("INSERT INTO people (name) VALUES ('ada')"))
            .unwrap();

        let updated = conn
            .execute(&Command::text("UPDATE people SET name = 'grace'"))
            .unwrap();
        assert_eq!(updated.rows_affected, 1);
        assert_eq!(updated.last_insert_id, None);

        let deleted = conn.execute(&Command::text("DELETE FROM people")).unwrap();
        assert_eq!(deleted.rows_affected, 1);
        assert_eq!(deleted.last_insert_id, None);
        conn.close().unwrap();
    }

    #[test]
    fn named_placeholders_bind_by_name() {
        let mut conn = memory();
        create_people(&mut conn);
        let command = Command {
            named: vec![
                NamedBinding {
                    placeholder: ":name".into(),
                    value: "grace".into(),
                    direction: Direction::In,
                },
                NamedBinding {
                    placeholder: ":id".into(),
                    value: Value::Integer(10),
                    direction: Direction::In,
                },
            ],
            ..Command::text("INSERT INTO people (id, name) VALUES (:id, :name)")
        };
        conn.execute(&command).unwrap();

        let rows = conn
            .execute(&Command::text("SELECT name FROM people WHERE id = 10"))
            .unwrap();
        assert_eq!(rows.records[0].value(0), Some(&Value::Text("grace".into())));
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let mut conn = memory();
        let command = Command {
            named: vec![NamedBinding {
                placeholder: ":missing".into(),
                value: Value::Null,
                direction: Direction::In,
            }],
            ..Command::text("SELECT :present")
        };
        let err = conn.execute(&command).unwrap_err();
        assert!(err.message.contains(":missing"));
    }

    #[test]
    fn too_many_positional_values() {
        let mut conn = memory();
        let err = conn
            .execute(&with_positional("SELECT ?", vec![1.into(), 2.into()]))
            .unwrap_err();
        assert!(err.message.contains("2 were bound"));
    }

    #[test]
    fn batch_inserts_one_row_per_element() {
        let mut conn = memory();
        create_people(&mut conn);
        let mut command = with_positional(
            "INSERT INTO people (name) VALUES (?)",
            vec![Value::List(vec!["a".into(), "b".into(), "c".into()])],
        );
        command.batch = true;
        let set = conn.execute(&command).unwrap();
        assert_eq!(set.rows_affected, 3);
        assert_eq!(set.last_insert_id, Some(Value::Integer(3)));

        let count = conn
            .execute(&Command::text("SELECT count(*) AS n FROM people"))
            .unwrap();
        assert_eq!(count.records[0].value_by_name("n"), Some(&Value::Integer(3)));
    }

    #[test]
    fn batch_broadcasts_scalars() {
        let mut conn = memory();
        conn.execute(&Command::text("CREATE TABLE t (k INTEGER, tag TEXT)"))
            .unwrap();
        let mut command = with_positional(
            "INSERT INTO t VALUES (?, ?)",
            vec![Value::List(vec![1.into(), 2.into()]), "same".into()],
        );
        command.batch = true;
        conn.execute(&command).unwrap();
        let rows = conn
            .execute(&Command::text("SELECT tag FROM t WHERE tag = 'same'"))
            .unwrap();
        assert_eq!(rows.records.len(), 2);
    }

    #[test]
    fn failing_batch_row_rolls_back_the_batch() {
        let mut conn = memory();
        create_people(&mut conn);
        let mut command = with_positional(
            "INSERT INTO people (name) VALUES (?)",
            vec![Value::List(vec!["ok".into(), Value::Null])],
        );
        command.batch = true;
        let err = conn.execute(&command).unwrap_err();
        assert!(err.code.is_some());

        let count = conn
            .execute(&Command::text("SELECT count(*) FROM people"))
            .unwrap();
        assert_eq!(count.records[0].value(0), Some(&Value::Integer(0)));
    }

    #[test]
    fn batch_lists_must_match() {
        let mut conn = memory();
        let mut command = with_positional(
            "SELECT ?, ?",
            vec![
                Value::List(vec![1.into()]),
                Value::List(vec![1.into(), 2.into()]),
            ],
        );
        command.batch = true;
        let err = conn.execute(&command).unwrap_err();
        assert!(err.message.contains("differ in length"));
    }

    #[test]
    fn list_outside_batch_is_rejected() {
        let mut conn = memory();
        let err = conn
            .execute(&with_positional("SELECT ?", vec![Value::List(vec![])]))
            .unwrap_err();
        assert!(err.message.contains("batch mode"));
    }

    #[test]
    fn syntax_error_carries_code() {
        let mut conn = memory();
        let err = conn.execute(&Command::text("SELEKT 1")).unwrap_err();
        // SQLITE_ERROR
        assert_eq!(err.code, Some(1));
        assert!(err.message.contains("syntax error"));
    }

    #[test]
    fn transactions_commit_and_roll_back() {
        let mut conn = memory();
        create_people(&mut conn);
        conn.begin().unwrap();
        conn.execute(&Command::text("INSERT INTO people (name) VALUES ('x')"))
            .unwrap();
        conn.rollback().unwrap();
        conn.begin().unwrap();
        conn.execute(&Command::text("INSERT INTO people (name) VALUES ('y')"))
            .unwrap();
        conn.commit().unwrap();

        let rows = conn
            .execute(&Command::text("SELECT name FROM people"))
            .unwrap();
        assert_eq!(rows.records.len(), 1);
        assert_eq!(rows.records[0].value(0), Some(&Value::Text("y".into())));
    }

    #[test]
    fn file_database_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.db");
        let params = ConnectParams::database(path.to_string_lossy());

        let mut first = SqliteDriver::new().open(&params).unwrap();
        create_people(&mut first);
        first
            .execute(&Command::text("INSERT INTO people (name) VALUES ('kept')"))
            .unwrap();
        first.close().unwrap();

        let mut second = SqliteDriver::new().open(&params).unwrap();
        let rows = second
            .execute(&Command::text("SELECT name FROM people"))
            .unwrap();
        assert_eq!(rows.records[0].value(0), Some(&Value::Text("kept".into())));
    }

    #[test]
    fn options_are_applied_as_pragmas() {
        let params = ConnectParams {
            options: Some("foreign_keys=on;busy_timeout=250".into()),
            ..ConnectParams::database(":memory:")
        };
        let mut conn = SqliteDriver::new().open(&params).unwrap();
        let rows = conn
            .execute(&Command::text("PRAGMA foreign_keys"))
            .unwrap();
        assert_eq!(rows.records[0].value(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn bad_option_fails_open() {
        let params = ConnectParams {
            options: Some("busy_timeout=soon".into()),
            ..ConnectParams::database(":memory:")
        };
        assert!(SqliteDriver::new().open(&params).is_err());

        let params = ConnectParams {
            options: Some("foo;cache_size=100".into()),
            ..ConnectParams::database(":memory:")
        };
        // `foo` has no value and is skipped.
        assert!(SqliteDriver::new().open(&params).is_ok());
    }

    #[test]
    fn missing_directory_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/db.sqlite");
        let err = SqliteDriver::new()
            .open(&ConnectParams::database(path.to_string_lossy()))
            .err()
            .unwrap();
        assert!(err.code.is_some());
    }
}
