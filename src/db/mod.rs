use crate::errors::{AppError, AppResult};
use crate::models::{UserName, UserRecord};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
            }
        }

        let db = Self {
            db_path: path.to_path_buf(),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn init_schema(&self) -> AppResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, vorname, nachname FROM users")?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRecord {
                id: row.get(0)?,
                vorname: row.get(1)?,
                nachname: row.get(2)?,
            })
        })?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn create_user(&self, name: UserName) -> AppResult<UserRecord> {
        let id = Uuid::new_v4().to_string();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO users (id, vorname, nachname) VALUES (?1, ?2, ?3)",
            params![id, name.vorname, name.nachname],
        )?;

        Ok(UserRecord {
            id,
            vorname: name.vorname,
            nachname: name.nachname,
        })
    }

    pub fn update_user(&self, id: &str, name: UserName) -> AppResult<UserRecord> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE users SET vorname = ?1, nachname = ?2 WHERE id = ?3",
            params![name.vorname, name.nachname, id],
        )?;
        if changed == 0 {
            return Err(user_not_found());
        }

        Ok(UserRecord {
            id: id.to_string(),
            vorname: name.vorname,
            nachname: name.nachname,
        })
    }

    pub fn delete_user(&self, id: &str) -> AppResult<()> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(user_not_found());
        }
        Ok(())
    }

    fn connect(&self) -> AppResult<Connection> {
        Connection::open(&self.db_path).map_err(AppError::from)
    }
}

pub const USER_NOT_FOUND: &str = "Benutzer nicht gefunden";

fn user_not_found() -> AppError {
    AppError::NotFound(USER_NOT_FOUND.to_string())
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use crate::models::UserName;

    fn name(vorname: &str, nachname: &str) -> UserName {
        UserName {
            vorname: vorname.to_string(),
            nachname: nachname.to_string(),
        }
    }

    #[test]
    fn database_can_insert_and_list_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("users.db")).expect("db");

        let created = db.create_user(name("Anna", "Muller")).expect("create");
        assert!(!created.id.is_empty());

        let users = db.list_users().expect("list");
        assert_eq!(users, vec![created]);
    }

    #[test]
    fn generated_ids_are_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("users.db")).expect("db");

        let first = db.create_user(name("Anna", "Muller")).expect("create");
        let second = db.create_user(name("Anna", "Muller")).expect("create");
        assert_ne!(first.id, second.id);
        assert_eq!(db.list_users().expect("list").len(), 2);
    }

    #[test]
    fn update_replaces_names_and_keeps_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("users.db")).expect("db");

        let created = db.create_user(name("Anna", "Muller")).expect("create");
        let updated = db
            .update_user(&created.id, name("Anna", "Schmidt"))
            .expect("update");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.nachname, "Schmidt");

        let users = db.list_users().expect("list");
        assert_eq!(users, vec![updated]);
    }

    #[test]
    fn update_of_unknown_id_is_not_found_and_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("users.db")).expect("db");
        let created = db.create_user(name("Anna", "Muller")).expect("create");

        let result = db.update_user("missing", name("Bob", "Meyer"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(db.list_users().expect("list"), vec![created]);
    }

    #[test]
    fn delete_removes_row_and_second_delete_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("users.db")).expect("db");
        let created = db.create_user(name("Anna", "Muller")).expect("create");

        db.delete_user(&created.id).expect("delete");
        assert!(db.list_users().expect("list").is_empty());
        assert!(matches!(
            db.delete_user(&created.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn schema_init_is_idempotent_and_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("users.db");
        let db = Database::new(&path).expect("db");
        db.create_user(name("Anna", "Muller")).expect("create");

        let reopened = Database::new(&path).expect("reopen");
        reopened.init_schema().expect("init again");
        assert_eq!(reopened.list_users().expect("list").len(), 1);
    }
}
